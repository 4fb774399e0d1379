//! Timetable Service

use sqlx::PgPool;
use thiserror::Error;

use crate::models::TimetableEntry;
use crate::utils::error::AppError;

#[derive(Error, Debug)]
pub enum TimetableServiceError {
    #[error("Teacher {0} has no assignments")]
    NoAssignments(i32),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<TimetableServiceError> for AppError {
    fn from(err: TimetableServiceError) -> Self {
        match err {
            TimetableServiceError::NoAssignments(_) => {
                AppError::NotFound("El docente no tiene horarios asignados".to_string())
            }
            TimetableServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type TimetableServiceResult<T> = Result<T, TimetableServiceError>;

const TIMETABLE_SELECT: &str = r#"
    SELECT a.id AS assignment_id, tb.day, tb.start_time, tb.end_time, tb.block_code,
           c.id AS course_id, c.code AS course_code, c.name AS course_name,
           s.code AS section_code, cl.name AS classroom, pv.name AS pavilion,
           p.first_names || ' ' || p.last_names AS teacher_name
    FROM assignments a
    JOIN time_blocks tb ON tb.id = a.time_block_id
    JOIN courses c ON c.id = a.course_id
    JOIN sections s ON s.id = a.section_id
    JOIN classrooms cl ON cl.id = a.classroom_id
    JOIN pavilions pv ON pv.id = cl.pavilion_id
    JOIN teachers t ON t.id = a.teacher_id
    JOIN persons p ON p.id = t.person_id
"#;

#[derive(Clone)]
pub struct TimetableService {
    db_pool: PgPool,
}

impl TimetableService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Weekly timetable of a teacher, Monday first
    pub async fn teacher_timetable(
        &self,
        teacher_id: i32,
    ) -> TimetableServiceResult<Vec<TimetableEntry>> {
        let query = format!(
            "{} WHERE a.teacher_id = $1 ORDER BY tb.day, tb.start_time",
            TIMETABLE_SELECT
        );
        let entries = sqlx::query_as::<_, TimetableEntry>(&query)
            .bind(teacher_id)
            .fetch_all(&self.db_pool)
            .await?;

        if entries.is_empty() {
            return Err(TimetableServiceError::NoAssignments(teacher_id));
        }
        Ok(entries)
    }

    /// Weekly timetable built from a student's active enrollments
    pub async fn student_timetable(
        &self,
        student_id: i32,
    ) -> TimetableServiceResult<Vec<TimetableEntry>> {
        let query = format!(
            r#"
            {}
            JOIN enrollments e ON e.assignment_id = a.id
            WHERE e.student_id = $1 AND e.status = 'ACTIVE'
            ORDER BY tb.day, tb.start_time
            "#,
            TIMETABLE_SELECT
        );
        let entries = sqlx::query_as::<_, TimetableEntry>(&query)
            .bind(student_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(entries)
    }
}
