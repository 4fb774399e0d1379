//! Report Service
//!
//! Read-only course reports for teachers: a course summary, the students at
//! risk of failing and the detailed grade sheet. Every report is limited to
//! courses the teacher has at least one assignment in.

use std::cmp::Ordering;

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;

use crate::models::{
    AtRiskStudent, CourseSummaryReport, GradeDetailReport, GradeDetailRow, GradeStats,
    LowPerformanceReport, ReportCourse, RiskLevel, StudentStanding,
};
use crate::service::attendance::summarize;
use crate::service::grade::PASSING_AVERAGE;
use crate::utils::error::AppError;

#[derive(Error, Debug)]
pub enum ReportServiceError {
    #[error("Course {0} not found")]
    CourseNotFound(i32),

    #[error("Teacher {teacher_id} has no assignment in course {course_id}")]
    NotCourseTeacher { teacher_id: i32, course_id: i32 },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<ReportServiceError> for AppError {
    fn from(err: ReportServiceError) -> Self {
        match err {
            ReportServiceError::CourseNotFound(id) => {
                AppError::NotFound(format!("Curso con ID {} no encontrado", id))
            }
            ReportServiceError::NotCourseTeacher { .. } => {
                AppError::Forbidden("No tienes permisos para este curso".to_string())
            }
            ReportServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type ReportServiceResult<T> = Result<T, ReportServiceError>;

/// Active enrollments of a course in the teacher's assignments
const ENROLLED_IN_TEACHER_COURSE: &str = r#"
    EXISTS (
        SELECT 1
        FROM enrollments e
        JOIN assignments a ON a.id = e.assignment_id
        WHERE e.student_id = s.id AND a.course_id = $1 AND a.teacher_id = $2
          AND e.status = 'ACTIVE'
    )
"#;

/// Keeps the students with a failing average or low attendance, critical
/// ones first and then by ascending average.
///
/// Students without a grade count as 0. Students with no recorded sessions
/// are judged on their average alone.
pub fn at_risk_students(standings: Vec<StudentStanding>) -> Vec<AtRiskStudent> {
    let mut students: Vec<AtRiskStudent> = standings
        .into_iter()
        .filter_map(|standing| {
            let average = standing.average.unwrap_or(0.0);
            let attendance = summarize(standing.student_id, standing.attended, standing.sessions);
            let failing = average < PASSING_AVERAGE;

            let risk = match (failing, attendance.alert) {
                (true, true) => RiskLevel::Critico,
                (true, false) | (false, true) => RiskLevel::Alerta,
                (false, false) => return None,
            };

            Some(AtRiskStudent {
                student_id: standing.student_id,
                university_code: standing.university_code,
                student_name: standing.student_name,
                email: standing.email,
                average,
                attendance_percentage: attendance.percentage,
                risk,
            })
        })
        .collect();

    students.sort_by(|a, b| match (a.risk, b.risk) {
        (RiskLevel::Critico, RiskLevel::Alerta) => Ordering::Less,
        (RiskLevel::Alerta, RiskLevel::Critico) => Ordering::Greater,
        _ => a.average.total_cmp(&b.average),
    });

    students
}

#[derive(Clone)]
pub struct ReportService {
    db_pool: PgPool,
}

impl ReportService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// The course, provided the teacher teaches it
    async fn course_for_teacher(
        &self,
        course_id: i32,
        teacher_id: i32,
    ) -> ReportServiceResult<ReportCourse> {
        let course = sqlx::query_as::<_, ReportCourse>(
            "SELECT id, code, name, credits FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(ReportServiceError::CourseNotFound(course_id))?;

        let teaches: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM assignments WHERE course_id = $1 AND teacher_id = $2)",
        )
        .bind(course_id)
        .bind(teacher_id)
        .fetch_one(&self.db_pool)
        .await?;

        if !teaches {
            return Err(ReportServiceError::NotCourseTeacher {
                teacher_id,
                course_id,
            });
        }

        Ok(course)
    }

    /// Enrollment, material, grade and attendance totals for a course
    pub async fn course_summary(
        &self,
        course_id: i32,
        teacher_id: i32,
    ) -> ReportServiceResult<CourseSummaryReport> {
        let course = self.course_for_teacher(course_id, teacher_id).await?;

        let enrolled_students: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT e.student_id)
            FROM enrollments e
            JOIN assignments a ON a.id = e.assignment_id
            WHERE a.course_id = $1 AND a.teacher_id = $2 AND e.status = 'ACTIVE'
            "#,
        )
        .bind(course_id)
        .bind(teacher_id)
        .fetch_one(&self.db_pool)
        .await?;

        let materials: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM teaching_materials WHERE course_id = $1 AND teacher_id = $2",
        )
        .bind(course_id)
        .bind(teacher_id)
        .fetch_one(&self.db_pool)
        .await?;

        let grades = sqlx::query_as::<_, GradeStats>(
            r#"
            SELECT ROUND(AVG(average)::NUMERIC, 2)::DOUBLE PRECISION AS average,
                   MAX(average) AS highest,
                   MIN(average) AS lowest,
                   COUNT(*) FILTER (WHERE average >= $3) AS passed,
                   COUNT(*) FILTER (WHERE average < $3) AS failed,
                   COUNT(*) AS recorded
            FROM grades
            WHERE course_id = $1 AND teacher_id = $2
            "#,
        )
        .bind(course_id)
        .bind(teacher_id)
        .bind(PASSING_AVERAGE)
        .fetch_one(&self.db_pool)
        .await?;

        let class_sessions: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT class_date) FROM attendance WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(CourseSummaryReport {
            course,
            enrolled_students,
            materials,
            grades,
            class_sessions,
            generated_at: Utc::now(),
        })
    }

    /// Enrolled students with a failing average or attendance below the minimum
    pub async fn low_performance(
        &self,
        course_id: i32,
        teacher_id: i32,
    ) -> ReportServiceResult<LowPerformanceReport> {
        self.course_for_teacher(course_id, teacher_id).await?;

        let query = format!(
            r#"
            SELECT s.id AS student_id, s.university_code,
                   p.last_names || ', ' || p.first_names AS student_name,
                   u.email,
                   g.average,
                   (SELECT COUNT(*) FROM attendance at
                    WHERE at.student_id = s.id AND at.course_id = $1
                      AND at.status IN ('PRESENTE', 'TARDANZA')) AS attended,
                   (SELECT COUNT(*) FROM attendance at
                    WHERE at.student_id = s.id AND at.course_id = $1) AS sessions
            FROM students s
            JOIN persons p ON p.id = s.person_id
            JOIN users u ON u.id = p.user_id
            LEFT JOIN grades g
                   ON g.student_id = s.id AND g.course_id = $1 AND g.teacher_id = $2
            WHERE {}
            ORDER BY student_name
            "#,
            ENROLLED_IN_TEACHER_COURSE
        );
        let standings = sqlx::query_as::<_, StudentStanding>(&query)
            .bind(course_id)
            .bind(teacher_id)
            .fetch_all(&self.db_pool)
            .await?;

        let students = at_risk_students(standings);
        Ok(LowPerformanceReport {
            total: students.len(),
            students,
            generated_at: Utc::now(),
        })
    }

    /// Grade sheet of every enrolled student, best average first
    pub async fn grade_detail(
        &self,
        course_id: i32,
        teacher_id: i32,
    ) -> ReportServiceResult<GradeDetailReport> {
        let course = self.course_for_teacher(course_id, teacher_id).await?;

        let query = format!(
            r#"
            SELECT s.id AS student_id, s.university_code,
                   p.last_names || ', ' || p.first_names AS student_name,
                   u.email,
                   g.practice, g.midterm, g.final_exam, g.makeup, g.deferred,
                   COALESCE(g.average, 0) AS average,
                   COALESCE(g.outcome, 'DESAPROBADO') AS outcome
            FROM students s
            JOIN persons p ON p.id = s.person_id
            JOIN users u ON u.id = p.user_id
            LEFT JOIN grades g
                   ON g.student_id = s.id AND g.course_id = $1 AND g.teacher_id = $2
            WHERE {}
            ORDER BY average DESC, student_name
            "#,
            ENROLLED_IN_TEACHER_COURSE
        );
        let students = sqlx::query_as::<_, GradeDetailRow>(&query)
            .bind(course_id)
            .bind(teacher_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(GradeDetailReport {
            course,
            students,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, GradeOutcome, GradeRequest};
    use crate::service::fixtures;
    use crate::service::GradeService;

    fn standing(
        student_id: i32,
        average: Option<f64>,
        attended: i64,
        sessions: i64,
    ) -> StudentStanding {
        StudentStanding {
            student_id,
            university_code: format!("2025{:04}", student_id),
            student_name: format!("Alumno {}", student_id),
            email: format!("alumno{}@unfv.edu.pe", student_id),
            average,
            attended,
            sessions,
        }
    }

    #[test]
    fn test_at_risk_classification() {
        let students = at_risk_students(vec![
            standing(1, Some(15.0), 10, 10),
            standing(2, Some(9.0), 10, 10),
            standing(3, Some(14.0), 5, 10),
            standing(4, Some(8.0), 5, 10),
        ]);

        let ids: Vec<i32> = students.iter().map(|s| s.student_id).collect();
        assert_eq!(ids, vec![4, 2, 3]);
        assert_eq!(students[0].risk, RiskLevel::Critico);
        assert_eq!(students[0].attendance_percentage, 50.0);
        assert_eq!(students[1].risk, RiskLevel::Alerta);
        assert_eq!(students[2].risk, RiskLevel::Alerta);
    }

    #[test]
    fn test_critical_students_sorted_by_average() {
        let students = at_risk_students(vec![
            standing(1, Some(10.0), 1, 10),
            standing(2, Some(3.0), 2, 10),
            standing(3, Some(1.0), 10, 10),
        ]);

        let ids: Vec<i32> = students.iter().map(|s| s.student_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_ungraded_student_counts_as_failing() {
        let students = at_risk_students(vec![standing(1, None, 0, 0)]);
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].average, 0.0);
        // no sessions yet: attendance does not raise the level
        assert_eq!(students[0].risk, RiskLevel::Alerta);
    }

    #[test]
    fn test_minimum_attendance_is_not_at_risk() {
        assert!(at_risk_students(vec![standing(1, Some(11.0), 7, 10)]).is_empty());
    }

    #[test]
    fn test_error_mapping() {
        let forbidden = AppError::from(ReportServiceError::NotCourseTeacher {
            teacher_id: 1,
            course_id: 2,
        });
        assert_eq!(forbidden.status_code().as_u16(), 403);
        assert_eq!(
            AppError::from(ReportServiceError::CourseNotFound(2))
                .status_code()
                .as_u16(),
            404
        );
    }

    #[sqlx::test]
    async fn test_reports_only_for_own_courses(pool: PgPool) {
        let course = fixtures::assigned_course(&pool).await;
        let other_teacher = fixtures::insert_teacher(&pool, "87654321").await;
        let service = ReportService::new(pool);

        let result = service.course_summary(course.course_id, other_teacher).await;
        assert!(matches!(
            result,
            Err(ReportServiceError::NotCourseTeacher { .. })
        ));

        let result = service.grade_detail(9999, course.teacher_id).await;
        assert!(matches!(result, Err(ReportServiceError::CourseNotFound(9999))));
    }

    #[sqlx::test]
    async fn test_reports_over_recorded_grades(pool: PgPool) {
        let course = fixtures::assigned_course(&pool).await;
        let strong = fixtures::insert_student(&pool, "11111111", "2025000001").await;
        let weak = fixtures::insert_student(&pool, "22222222", "2025000002").await;
        fixtures::enroll(&pool, strong, course.assignment_id).await;
        fixtures::enroll(&pool, weak, course.assignment_id).await;

        let grades = GradeService::new(pool.clone());
        for (student_id, score) in [(strong, 16.0), (weak, 8.0)] {
            grades
                .upsert_grade(GradeRequest {
                    student_id,
                    course_id: course.course_id,
                    teacher_id: course.teacher_id,
                    practice: score,
                    midterm: score,
                    final_exam: score,
                    makeup: None,
                    deferred: None,
                })
                .await
                .unwrap();
        }
        for (student_id, status) in [
            (strong, AttendanceStatus::Presente),
            (weak, AttendanceStatus::Ausente),
        ] {
            fixtures::mark_attendance(&pool, student_id, &course, "2025-04-07", status).await;
        }

        let service = ReportService::new(pool);

        let summary = service
            .course_summary(course.course_id, course.teacher_id)
            .await
            .unwrap();
        assert_eq!(summary.enrolled_students, 2);
        assert_eq!(summary.grades.recorded, 2);
        assert_eq!(summary.grades.passed, 1);
        assert_eq!(summary.grades.failed, 1);
        assert_eq!(summary.grades.average, Some(12.0));
        assert_eq!(summary.grades.highest, Some(16.0));
        assert_eq!(summary.class_sessions, 1);

        let low = service
            .low_performance(course.course_id, course.teacher_id)
            .await
            .unwrap();
        assert_eq!(low.total, 1);
        assert_eq!(low.students[0].student_id, weak);
        assert_eq!(low.students[0].risk, RiskLevel::Critico);

        let detail = service
            .grade_detail(course.course_id, course.teacher_id)
            .await
            .unwrap();
        assert_eq!(detail.course.id, course.course_id);
        assert_eq!(detail.students.len(), 2);
        assert_eq!(detail.students[0].student_id, strong);
        assert_eq!(detail.students[0].outcome, GradeOutcome::Aprobado);
        assert_eq!(detail.students[1].outcome, GradeOutcome::Desaprobado);
    }
}
