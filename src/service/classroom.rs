//! Classroom Service

use log::info;
use sqlx::PgPool;
use thiserror::Error;
use validator::Validate;

use crate::models::{Classroom, ClassroomRequest, ClassroomStatus};
use crate::utils::error::{is_foreign_key_violation, violated_constraint, AppError};

#[derive(Error, Debug)]
pub enum ClassroomServiceError {
    #[error("Classroom not found")]
    ClassroomNotFound,

    #[error("Time block not found")]
    TimeBlockNotFound,

    #[error("Classroom name already used in this pavilion")]
    DuplicateName,

    #[error("Pavilion or classroom type not found")]
    ReferenceNotFound,

    #[error("Classroom has assignments")]
    ClassroomInUse,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl ClassroomServiceError {
    /// `in_use` selects how a foreign-key violation reads: a delete is blocked
    /// by referencing rows, an insert or update points at a missing row
    fn from_write(err: sqlx::Error, in_use: bool) -> Self {
        match violated_constraint(&err) {
            Some("classrooms_pavilion_name_key") => Self::DuplicateName,
            _ if is_foreign_key_violation(&err) && in_use => Self::ClassroomInUse,
            _ if is_foreign_key_violation(&err) => Self::ReferenceNotFound,
            _ => Self::DatabaseError(err),
        }
    }
}

impl From<ClassroomServiceError> for AppError {
    fn from(err: ClassroomServiceError) -> Self {
        match err {
            ClassroomServiceError::ClassroomNotFound => {
                AppError::NotFound("Aula no encontrada".to_string())
            }
            ClassroomServiceError::TimeBlockNotFound => {
                AppError::NotFound("Bloque horario no encontrado".to_string())
            }
            ClassroomServiceError::DuplicateName => {
                AppError::Conflict("Ya existe un aula con ese nombre en el pabellón".to_string())
            }
            ClassroomServiceError::ReferenceNotFound => {
                AppError::NotFound("Pabellón o tipo de aula no encontrado".to_string())
            }
            ClassroomServiceError::ClassroomInUse => {
                AppError::Dependency("El aula tiene asignaciones registradas".to_string())
            }
            ClassroomServiceError::ValidationError(msg) => AppError::Validation(msg),
            ClassroomServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type ClassroomServiceResult<T> = Result<T, ClassroomServiceError>;

const CLASSROOM_SELECT: &str = r#"
    SELECT cl.id, cl.name, cl.capacity, cl.status,
           cl.classroom_type_id, ct.name AS classroom_type,
           cl.pavilion_id, pv.name AS pavilion
    FROM classrooms cl
    JOIN classroom_types ct ON ct.id = cl.classroom_type_id
    JOIN pavilions pv ON pv.id = cl.pavilion_id
"#;

#[derive(Clone)]
pub struct ClassroomService {
    db_pool: PgPool,
}

impl ClassroomService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn list_classrooms(&self) -> ClassroomServiceResult<Vec<Classroom>> {
        let query = format!("{} ORDER BY pv.name, cl.name", CLASSROOM_SELECT);
        let classrooms = sqlx::query_as::<_, Classroom>(&query)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(classrooms)
    }

    pub async fn get_classroom(&self, classroom_id: i32) -> ClassroomServiceResult<Classroom> {
        let query = format!("{} WHERE cl.id = $1", CLASSROOM_SELECT);
        sqlx::query_as::<_, Classroom>(&query)
            .bind(classroom_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ClassroomServiceError::ClassroomNotFound)
    }

    pub async fn create_classroom(
        &self,
        request: ClassroomRequest,
    ) -> ClassroomServiceResult<Classroom> {
        request
            .validate()
            .map_err(|e| ClassroomServiceError::ValidationError(e.to_string()))?;

        let classroom_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO classrooms (name, capacity, status, classroom_type_id, pavilion_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(request.name.trim())
        .bind(request.capacity)
        .bind(request.status.unwrap_or(ClassroomStatus::Operational))
        .bind(request.classroom_type_id)
        .bind(request.pavilion_id)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| ClassroomServiceError::from_write(e, false))?;

        info!("Classroom {} created", classroom_id);
        self.get_classroom(classroom_id).await
    }

    pub async fn update_classroom(
        &self,
        classroom_id: i32,
        request: ClassroomRequest,
    ) -> ClassroomServiceResult<Classroom> {
        request
            .validate()
            .map_err(|e| ClassroomServiceError::ValidationError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE classrooms
            SET name = $1, capacity = $2, status = COALESCE($3, status),
                classroom_type_id = $4, pavilion_id = $5
            WHERE id = $6
            "#,
        )
        .bind(request.name.trim())
        .bind(request.capacity)
        .bind(request.status)
        .bind(request.classroom_type_id)
        .bind(request.pavilion_id)
        .bind(classroom_id)
        .execute(&self.db_pool)
        .await
        .map_err(|e| ClassroomServiceError::from_write(e, false))?;

        if result.rows_affected() == 0 {
            return Err(ClassroomServiceError::ClassroomNotFound);
        }

        info!("Classroom {} updated", classroom_id);
        self.get_classroom(classroom_id).await
    }

    pub async fn delete_classroom(&self, classroom_id: i32) -> ClassroomServiceResult<()> {
        let result = sqlx::query("DELETE FROM classrooms WHERE id = $1")
            .bind(classroom_id)
            .execute(&self.db_pool)
            .await
            .map_err(|e| ClassroomServiceError::from_write(e, true))?;

        if result.rows_affected() == 0 {
            return Err(ClassroomServiceError::ClassroomNotFound);
        }

        info!("Classroom {} deleted", classroom_id);
        Ok(())
    }

    /// Operational classrooms with no assignment at the given time block
    pub async fn available_at(&self, time_block_id: i32) -> ClassroomServiceResult<Vec<Classroom>> {
        let block_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM time_blocks WHERE id = $1)")
                .bind(time_block_id)
                .fetch_one(&self.db_pool)
                .await?;
        if !block_exists {
            return Err(ClassroomServiceError::TimeBlockNotFound);
        }

        let query = format!(
            r#"
            {}
            WHERE cl.status = $1
              AND NOT EXISTS (
                  SELECT 1 FROM assignments a
                  WHERE a.classroom_id = cl.id AND a.time_block_id = $2
              )
            ORDER BY pv.name, cl.name
            "#,
            CLASSROOM_SELECT
        );
        let classrooms = sqlx::query_as::<_, Classroom>(&query)
            .bind(ClassroomStatus::Operational)
            .bind(time_block_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(classrooms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let status = |e: ClassroomServiceError| AppError::from(e).status_code().as_u16();
        assert_eq!(status(ClassroomServiceError::ClassroomInUse), 409);
        assert_eq!(status(ClassroomServiceError::DuplicateName), 409);
        assert_eq!(status(ClassroomServiceError::ReferenceNotFound), 404);
    }
}
