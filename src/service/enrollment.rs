//! Enrollment Service
//!
//! Student self-service: browse open assignments, enroll and drop.

use log::info;
use sqlx::PgPool;
use thiserror::Error;

use crate::models::{EnrollRequest, Enrollment, OfferedAssignment, RecordStatus};
use crate::utils::error::{is_foreign_key_violation, AppError};

#[derive(Error, Debug)]
pub enum EnrollmentServiceError {
    #[error("Assignment not found")]
    AssignmentNotFound,

    #[error("Student not found")]
    StudentNotFound,

    #[error("Enrollment not found")]
    EnrollmentNotFound,

    #[error("Already enrolled in this assignment")]
    AlreadyEnrolled,

    #[error("Section is not open for enrollment")]
    SectionClosed,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<EnrollmentServiceError> for AppError {
    fn from(err: EnrollmentServiceError) -> Self {
        match err {
            EnrollmentServiceError::AssignmentNotFound => {
                AppError::NotFound("Asignación no encontrada".to_string())
            }
            EnrollmentServiceError::StudentNotFound => {
                AppError::NotFound("Estudiante no encontrado".to_string())
            }
            EnrollmentServiceError::EnrollmentNotFound => {
                AppError::NotFound("Matrícula no encontrada".to_string())
            }
            EnrollmentServiceError::AlreadyEnrolled => {
                AppError::Conflict("Ya está matriculado en este curso".to_string())
            }
            EnrollmentServiceError::SectionClosed => {
                AppError::BadRequest("La sección no está activa".to_string())
            }
            EnrollmentServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type EnrollmentServiceResult<T> = Result<T, EnrollmentServiceError>;

/// Assignment rows seen from one student; `e` is that student's active enrollment
const OFFERED_SELECT: &str = r#"
    SELECT a.id AS assignment_id, e.id AS enrollment_id,
           c.id AS course_id, c.code AS course_code, c.name AS course_name, c.credits,
           s.code AS section_code,
           p.first_names || ' ' || p.last_names AS teacher_name,
           tb.day, tb.start_time, tb.end_time,
           cl.name AS classroom, cl.capacity,
           (SELECT COUNT(*) FROM enrollments x
            WHERE x.assignment_id = a.id AND x.status = 'ACTIVE') AS enrolled
    FROM assignments a
    JOIN courses c ON c.id = a.course_id
    JOIN sections s ON s.id = a.section_id
    JOIN teachers t ON t.id = a.teacher_id
    JOIN persons p ON p.id = t.person_id
    JOIN time_blocks tb ON tb.id = a.time_block_id
    JOIN classrooms cl ON cl.id = a.classroom_id
    LEFT JOIN enrollments e
           ON e.assignment_id = a.id AND e.student_id = $1 AND e.status = 'ACTIVE'
"#;

#[derive(Clone)]
pub struct EnrollmentService {
    db_pool: PgPool,
}

impl EnrollmentService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Assignments in active sections the student has not enrolled in
    pub async fn available(&self, student_id: i32) -> EnrollmentServiceResult<Vec<OfferedAssignment>> {
        let query = format!(
            "{} WHERE s.status = 'ACTIVE' AND e.id IS NULL ORDER BY c.cycle, c.name, s.code, tb.day, tb.start_time",
            OFFERED_SELECT
        );
        let offered = sqlx::query_as::<_, OfferedAssignment>(&query)
            .bind(student_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(offered)
    }

    pub async fn my_enrollments(
        &self,
        student_id: i32,
    ) -> EnrollmentServiceResult<Vec<OfferedAssignment>> {
        let query = format!(
            "{} WHERE e.id IS NOT NULL ORDER BY tb.day, tb.start_time",
            OFFERED_SELECT
        );
        let enrolled = sqlx::query_as::<_, OfferedAssignment>(&query)
            .bind(student_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(enrolled)
    }

    /// Enroll, or reactivate a dropped enrollment for the same assignment
    pub async fn enroll(&self, request: EnrollRequest) -> EnrollmentServiceResult<Enrollment> {
        let mut tx = self.db_pool.begin().await?;

        let section_status: Option<RecordStatus> = sqlx::query_scalar(
            r#"
            SELECT s.status FROM assignments a
            JOIN sections s ON s.id = a.section_id
            WHERE a.id = $1
            "#,
        )
        .bind(request.assignment_id)
        .fetch_optional(&mut *tx)
        .await?;

        match section_status {
            None => return Err(EnrollmentServiceError::AssignmentNotFound),
            Some(RecordStatus::Inactive) => return Err(EnrollmentServiceError::SectionClosed),
            Some(RecordStatus::Active) => {}
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO enrollments (student_id, assignment_id, status)
            VALUES ($1, $2, 'ACTIVE')
            ON CONFLICT ON CONSTRAINT enrollments_student_assignment_key DO UPDATE
            SET status = 'ACTIVE', enrolled_at = NOW()
            WHERE enrollments.status = 'INACTIVE'
            RETURNING id, student_id, assignment_id, status, enrolled_at
            "#,
        )
        .bind(request.student_id)
        .bind(request.assignment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                EnrollmentServiceError::StudentNotFound
            } else {
                EnrollmentServiceError::DatabaseError(e)
            }
        })?
        .ok_or(EnrollmentServiceError::AlreadyEnrolled)?;

        tx.commit().await?;

        info!(
            "Student {} enrolled in assignment {}",
            request.student_id, request.assignment_id
        );
        Ok(enrollment)
    }

    /// Mark the student's enrollment inactive
    pub async fn drop_enrollment(
        &self,
        student_id: i32,
        enrollment_id: i32,
    ) -> EnrollmentServiceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE enrollments SET status = 'INACTIVE'
            WHERE id = $1 AND student_id = $2 AND status = 'ACTIVE'
            "#,
        )
        .bind(enrollment_id)
        .bind(student_id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EnrollmentServiceError::EnrollmentNotFound);
        }

        info!("Student {} dropped enrollment {}", student_id, enrollment_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let status = |e: EnrollmentServiceError| AppError::from(e).status_code().as_u16();
        assert_eq!(status(EnrollmentServiceError::AlreadyEnrolled), 409);
        assert_eq!(status(EnrollmentServiceError::AssignmentNotFound), 404);
        assert_eq!(status(EnrollmentServiceError::SectionClosed), 400);
    }
}
