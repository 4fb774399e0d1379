//! Section Service

use log::info;
use sqlx::PgPool;
use thiserror::Error;
use validator::Validate;

use crate::models::{Section, SectionRequest};
use crate::utils::error::{is_foreign_key_violation, violated_constraint, AppError};

#[derive(Error, Debug)]
pub enum SectionServiceError {
    #[error("Section not found")]
    SectionNotFound,

    #[error("Section already exists for this cycle and period")]
    DuplicateSection,

    #[error("Section has assignments")]
    SectionInUse,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl SectionServiceError {
    fn from_write(err: sqlx::Error) -> Self {
        match violated_constraint(&err) {
            Some("sections_code_cycle_period_key") => Self::DuplicateSection,
            _ if is_foreign_key_violation(&err) => Self::SectionInUse,
            _ => Self::DatabaseError(err),
        }
    }
}

impl From<SectionServiceError> for AppError {
    fn from(err: SectionServiceError) -> Self {
        match err {
            SectionServiceError::SectionNotFound => {
                AppError::NotFound("Sección no encontrada".to_string())
            }
            SectionServiceError::DuplicateSection => AppError::Conflict(
                "Ya existe una sección con ese código, ciclo y periodo".to_string(),
            ),
            SectionServiceError::SectionInUse => {
                AppError::Dependency("La sección tiene asignaciones registradas".to_string())
            }
            SectionServiceError::ValidationError(msg) => AppError::Validation(msg),
            SectionServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type SectionServiceResult<T> = Result<T, SectionServiceError>;

#[derive(Clone)]
pub struct SectionService {
    db_pool: PgPool,
}

impl SectionService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn list_sections(&self) -> SectionServiceResult<Vec<Section>> {
        let sections = sqlx::query_as::<_, Section>(
            r#"
            SELECT id, code, academic_cycle, period, status
            FROM sections
            ORDER BY period DESC, academic_cycle, code
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(sections)
    }

    pub async fn get_section(&self, section_id: i32) -> SectionServiceResult<Section> {
        sqlx::query_as::<_, Section>(
            "SELECT id, code, academic_cycle, period, status FROM sections WHERE id = $1",
        )
        .bind(section_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(SectionServiceError::SectionNotFound)
    }

    pub async fn create_section(&self, request: SectionRequest) -> SectionServiceResult<Section> {
        request
            .validate()
            .map_err(|e| SectionServiceError::ValidationError(e.to_string()))?;

        let section = sqlx::query_as::<_, Section>(
            r#"
            INSERT INTO sections (code, academic_cycle, period, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, code, academic_cycle, period, status
            "#,
        )
        .bind(request.code.trim().to_uppercase())
        .bind(request.academic_cycle.trim())
        .bind(request.period.trim())
        .bind(request.status.unwrap_or_default())
        .fetch_one(&self.db_pool)
        .await
        .map_err(SectionServiceError::from_write)?;

        info!("Section {} created for {}", section.code, section.period);
        Ok(section)
    }

    pub async fn update_section(
        &self,
        section_id: i32,
        request: SectionRequest,
    ) -> SectionServiceResult<Section> {
        request
            .validate()
            .map_err(|e| SectionServiceError::ValidationError(e.to_string()))?;

        let section = sqlx::query_as::<_, Section>(
            r#"
            UPDATE sections
            SET code = $1, academic_cycle = $2, period = $3, status = COALESCE($4, status)
            WHERE id = $5
            RETURNING id, code, academic_cycle, period, status
            "#,
        )
        .bind(request.code.trim().to_uppercase())
        .bind(request.academic_cycle.trim())
        .bind(request.period.trim())
        .bind(request.status)
        .bind(section_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(SectionServiceError::from_write)?
        .ok_or(SectionServiceError::SectionNotFound)?;

        info!("Section {} updated", section_id);
        Ok(section)
    }

    pub async fn delete_section(&self, section_id: i32) -> SectionServiceResult<()> {
        let result = sqlx::query("DELETE FROM sections WHERE id = $1")
            .bind(section_id)
            .execute(&self.db_pool)
            .await
            .map_err(SectionServiceError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(SectionServiceError::SectionNotFound);
        }

        info!("Section {} deleted", section_id);
        Ok(())
    }
}
