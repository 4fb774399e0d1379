//! Grade Service
//!
//! Teachers submit component scores; the service derives the final average
//! and outcome and stores one row per (student, course, teacher).

use log::info;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use validator::Validate;

use crate::models::{CourseGrade, Grade, GradeOutcome, GradeRequest, GradeUpsertResponse, StudentGrade};
use crate::service::audit::{self, AuditAction};
use crate::utils::error::{is_foreign_key_violation, violated_constraint, AppError};

/// Minimum average that passes a course
pub const PASSING_AVERAGE: f64 = 11.0;

const PRACTICE_WEIGHT: f64 = 0.4;
const MIDTERM_WEIGHT: f64 = 0.3;
const FINAL_WEIGHT: f64 = 0.3;

#[derive(Error, Debug)]
pub enum GradeServiceError {
    #[error("Student, course or teacher not found")]
    ReferenceNotFound,

    #[error("Scores must be between 0 and 20")]
    ScoreOutOfRange,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl GradeServiceError {
    fn from_write(err: sqlx::Error) -> Self {
        match violated_constraint(&err) {
            Some("grades_range_check") => Self::ScoreOutOfRange,
            _ if is_foreign_key_violation(&err) => Self::ReferenceNotFound,
            _ => Self::DatabaseError(err),
        }
    }
}

impl From<GradeServiceError> for AppError {
    fn from(err: GradeServiceError) -> Self {
        match err {
            GradeServiceError::ReferenceNotFound => {
                AppError::NotFound("Estudiante, curso o docente no encontrado".to_string())
            }
            GradeServiceError::ScoreOutOfRange => {
                AppError::Validation("Las notas deben estar entre 0 y 20".to_string())
            }
            GradeServiceError::ValidationError(msg) => AppError::Validation(msg),
            GradeServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type GradeServiceResult<T> = Result<T, GradeServiceError>;

/// Derived average and outcome for a set of component scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeResult {
    pub average: f64,
    pub outcome: GradeOutcome,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Weighted average of practice, midterm and final.
///
/// A positive make-up score first replaces the lower of midterm and final.
/// When the weighted average still fails, a positive deferred score is
/// averaged with it.
pub fn compute_grade(
    practice: f64,
    midterm: f64,
    final_exam: f64,
    makeup: Option<f64>,
    deferred: Option<f64>,
) -> GradeResult {
    let (mut midterm, mut final_exam) = (midterm, final_exam);
    if let Some(makeup) = makeup.filter(|m| *m > 0.0) {
        if midterm < final_exam {
            midterm = makeup;
        } else {
            final_exam = makeup;
        }
    }

    let mut average =
        practice * PRACTICE_WEIGHT + midterm * MIDTERM_WEIGHT + final_exam * FINAL_WEIGHT;

    if average < PASSING_AVERAGE {
        if let Some(deferred) = deferred.filter(|d| *d > 0.0) {
            average = (average + deferred) / 2.0;
        }
    }

    let average = round2(average);
    let outcome = if average >= PASSING_AVERAGE {
        GradeOutcome::Aprobado
    } else {
        GradeOutcome::Desaprobado
    };

    GradeResult { average, outcome }
}

#[derive(sqlx::FromRow)]
struct UpsertedGrade {
    #[sqlx(flatten)]
    grade: Grade,
    inserted: bool,
}

#[derive(Clone)]
pub struct GradeService {
    db_pool: PgPool,
}

impl GradeService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Insert or replace the grade of a student in a teacher's course
    pub async fn upsert_grade(
        &self,
        request: GradeRequest,
    ) -> GradeServiceResult<GradeUpsertResponse> {
        request
            .validate()
            .map_err(|e| GradeServiceError::ValidationError(e.to_string()))?;

        let result = compute_grade(
            request.practice,
            request.midterm,
            request.final_exam,
            request.makeup,
            request.deferred,
        );

        let mut tx = self.db_pool.begin().await?;

        let upserted = sqlx::query_as::<_, UpsertedGrade>(
            r#"
            INSERT INTO grades
                (student_id, course_id, teacher_id, practice, midterm, final_exam,
                 makeup, deferred, average, outcome)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT ON CONSTRAINT grades_student_course_teacher_key DO UPDATE
            SET practice = EXCLUDED.practice,
                midterm = EXCLUDED.midterm,
                final_exam = EXCLUDED.final_exam,
                makeup = EXCLUDED.makeup,
                deferred = EXCLUDED.deferred,
                average = EXCLUDED.average,
                outcome = EXCLUDED.outcome,
                updated_at = NOW()
            RETURNING id, student_id, course_id, teacher_id, practice, midterm, final_exam,
                      makeup, deferred, average, outcome, created_at, updated_at,
                      (xmax = 0) AS inserted
            "#,
        )
        .bind(request.student_id)
        .bind(request.course_id)
        .bind(request.teacher_id)
        .bind(request.practice)
        .bind(request.midterm)
        .bind(request.final_exam)
        .bind(request.makeup)
        .bind(request.deferred)
        .bind(result.average)
        .bind(result.outcome)
        .fetch_one(&mut *tx)
        .await
        .map_err(GradeServiceError::from_write)?;

        let action = if upserted.inserted {
            AuditAction::Insert
        } else {
            AuditAction::Update
        };
        audit::record(
            &mut tx,
            request.teacher_id,
            action,
            "grades",
            Some(upserted.grade.id),
            json!({
                "student_id": request.student_id,
                "course_id": request.course_id,
                "average": result.average,
                "outcome": result.outcome,
            }),
        )
        .await?;

        tx.commit().await?;

        info!(
            "Grade {} {} for student {} in course {}: {:.2}",
            upserted.grade.id,
            if upserted.inserted { "created" } else { "updated" },
            request.student_id,
            request.course_id,
            result.average
        );

        Ok(GradeUpsertResponse {
            grade: upserted.grade,
            created: upserted.inserted,
        })
    }

    /// Every student enrolled with the teacher in the course, graded or not
    pub async fn course_grades(
        &self,
        course_id: i32,
        teacher_id: i32,
    ) -> GradeServiceResult<Vec<CourseGrade>> {
        let grades = sqlx::query_as::<_, CourseGrade>(
            r#"
            SELECT DISTINCT s.id AS student_id, s.university_code,
                   p.last_names || ', ' || p.first_names AS student_name,
                   g.practice, g.midterm, g.final_exam, g.makeup, g.deferred,
                   g.average, g.outcome
            FROM enrollments e
            JOIN assignments a ON a.id = e.assignment_id
            JOIN students s ON s.id = e.student_id
            JOIN persons p ON p.id = s.person_id
            LEFT JOIN grades g
                   ON g.student_id = s.id AND g.course_id = a.course_id AND g.teacher_id = a.teacher_id
            WHERE a.course_id = $1 AND a.teacher_id = $2 AND e.status = 'ACTIVE'
            ORDER BY student_name
            "#,
        )
        .bind(course_id)
        .bind(teacher_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(grades)
    }

    pub async fn student_grades(&self, student_id: i32) -> GradeServiceResult<Vec<StudentGrade>> {
        let grades = sqlx::query_as::<_, StudentGrade>(
            r#"
            SELECT g.course_id, c.code AS course_code, c.name AS course_name,
                   g.practice, g.midterm, g.final_exam, g.makeup, g.deferred,
                   g.average, g.outcome
            FROM grades g
            JOIN courses c ON c.id = g.course_id
            WHERE g.student_id = $1
            ORDER BY c.cycle, c.name
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(grades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fixtures;

    #[test]
    fn test_weighted_average_passes() {
        let result = compute_grade(15.0, 8.0, 10.0, None, None);
        assert_eq!(result.average, 11.4);
        assert_eq!(result.outcome, GradeOutcome::Aprobado);
    }

    #[test]
    fn test_pass_threshold_is_inclusive() {
        let exact = compute_grade(11.0, 11.0, 11.0, None, None);
        assert_eq!(exact.average, 11.0);
        assert_eq!(exact.outcome, GradeOutcome::Aprobado);

        // 0.4*10.99 + 0.3*10.99 + 0.3*10.99
        let below = compute_grade(10.99, 10.99, 10.99, None, None);
        assert_eq!(below.average, 10.99);
        assert_eq!(below.outcome, GradeOutcome::Desaprobado);
    }

    #[test]
    fn test_makeup_replaces_lower_exam() {
        // midterm 6 is replaced by 14: 4.0 + 4.2 + 3.6
        let result = compute_grade(10.0, 6.0, 12.0, Some(14.0), None);
        assert_eq!(result.average, 11.8);
        assert_eq!(result.outcome, GradeOutcome::Aprobado);

        // a lower make-up score still replaces the exam: 4.0 + 1.2 + 3.6
        let lower = compute_grade(10.0, 6.0, 12.0, Some(4.0), None);
        assert_eq!(lower.average, 8.8);
        assert_eq!(lower.outcome, GradeOutcome::Desaprobado);

        // tied exams: one of them is replaced, 4.0 + 3.0 + 4.8
        let tie = compute_grade(10.0, 10.0, 10.0, Some(16.0), None);
        assert_eq!(tie.average, 11.8);

        let zero = compute_grade(10.0, 6.0, 12.0, Some(0.0), None);
        assert_eq!(zero.average, 9.4);
    }

    #[test]
    fn test_deferred_only_applies_when_failing() {
        let failing = compute_grade(8.0, 8.0, 8.0, None, Some(16.0));
        assert_eq!(failing.average, 12.0);
        assert_eq!(failing.outcome, GradeOutcome::Aprobado);

        let passing = compute_grade(15.0, 8.0, 10.0, None, Some(20.0));
        assert_eq!(passing.average, 11.4);
    }

    #[test]
    fn test_average_is_rounded() {
        let result = compute_grade(13.0, 7.0, 9.0, None, None);
        assert_eq!(result.average, 10.0);
        let result = compute_grade(12.33, 0.0, 0.0, None, None);
        assert_eq!(result.average, 4.93);
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            AppError::from(GradeServiceError::ReferenceNotFound)
                .status_code()
                .as_u16(),
            404
        );
        assert_eq!(
            AppError::from(GradeServiceError::ScoreOutOfRange)
                .status_code()
                .as_u16(),
            400
        );
    }

    fn grade_request(
        student_id: i32,
        course: &fixtures::AssignedCourse,
        midterm: f64,
    ) -> GradeRequest {
        GradeRequest {
            student_id,
            course_id: course.course_id,
            teacher_id: course.teacher_id,
            practice: 12.0,
            midterm,
            final_exam: 12.0,
            makeup: None,
            deferred: None,
        }
    }

    #[sqlx::test]
    async fn test_upsert_reports_created_then_updated(pool: PgPool) {
        let course = fixtures::assigned_course(&pool).await;
        let student = fixtures::insert_student(&pool, "11111111", "2025000001").await;
        let service = GradeService::new(pool.clone());

        let first = service
            .upsert_grade(grade_request(student, &course, 6.0))
            .await
            .unwrap();
        assert!(first.created);
        assert_eq!(first.grade.average, 10.2);
        assert_eq!(first.grade.outcome, GradeOutcome::Desaprobado);
        assert!(first.grade.updated_at.is_none());

        let second = service
            .upsert_grade(grade_request(student, &course, 16.0))
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.grade.id, first.grade.id);
        assert_eq!(second.grade.average, 13.2);
        assert_eq!(second.grade.outcome, GradeOutcome::Aprobado);
        assert!(second.grade.updated_at.is_some());

        let actions: Vec<String> = sqlx::query_scalar(
            "SELECT action FROM teacher_audit_log WHERE table_name = 'grades' ORDER BY id",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(actions, vec!["INSERT", "UPDATE"]);
    }

    #[sqlx::test]
    async fn test_unknown_student_is_not_found(pool: PgPool) {
        let course = fixtures::assigned_course(&pool).await;
        let service = GradeService::new(pool);

        let result = service.upsert_grade(grade_request(9999, &course, 10.0)).await;
        assert!(matches!(result, Err(GradeServiceError::ReferenceNotFound)));
    }
}
