//! Catalog Service
//!
//! Reference data used by the forms of the back office.

use log::info;
use sqlx::PgPool;
use thiserror::Error;
use validator::Validate;

use crate::models::{
    Department, District, NamedItem, PavilionRequest, Province, School, SchoolRequest,
};
use crate::utils::error::{is_foreign_key_violation, violated_constraint, AppError};

#[derive(Error, Debug)]
pub enum CatalogServiceError {
    #[error("School not found")]
    SchoolNotFound,

    #[error("A school with this name already exists")]
    DuplicateSchool,

    #[error("School is still referenced")]
    SchoolInUse,

    #[error("A pavilion with this name already exists")]
    DuplicatePavilion,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<CatalogServiceError> for AppError {
    fn from(err: CatalogServiceError) -> Self {
        match err {
            CatalogServiceError::SchoolNotFound => {
                AppError::NotFound("Escuela no encontrada".to_string())
            }
            CatalogServiceError::DuplicateSchool => {
                AppError::Conflict("Ya existe una escuela con ese nombre".to_string())
            }
            CatalogServiceError::SchoolInUse => AppError::Dependency(
                "La escuela tiene alumnos, docentes o administradores asociados".to_string(),
            ),
            CatalogServiceError::DuplicatePavilion => {
                AppError::Conflict("Ya existe un pabellón con ese nombre".to_string())
            }
            CatalogServiceError::ValidationError(msg) => AppError::Validation(msg),
            CatalogServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type CatalogServiceResult<T> = Result<T, CatalogServiceError>;

fn school_write_error(err: sqlx::Error) -> CatalogServiceError {
    if violated_constraint(&err) == Some("schools_name_key") {
        CatalogServiceError::DuplicateSchool
    } else {
        CatalogServiceError::DatabaseError(err)
    }
}

#[derive(Clone)]
pub struct CatalogService {
    db_pool: PgPool,
}

impl CatalogService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn list_schools(&self) -> CatalogServiceResult<Vec<School>> {
        let schools =
            sqlx::query_as::<_, School>("SELECT id, name, faculty FROM schools ORDER BY name")
                .fetch_all(&self.db_pool)
                .await?;
        Ok(schools)
    }

    pub async fn get_school(&self, school_id: i32) -> CatalogServiceResult<School> {
        sqlx::query_as::<_, School>("SELECT id, name, faculty FROM schools WHERE id = $1")
            .bind(school_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(CatalogServiceError::SchoolNotFound)
    }

    pub async fn create_school(&self, request: SchoolRequest) -> CatalogServiceResult<School> {
        request
            .validate()
            .map_err(|e| CatalogServiceError::ValidationError(e.to_string()))?;

        let school = sqlx::query_as::<_, School>(
            "INSERT INTO schools (name, faculty) VALUES ($1, $2) RETURNING id, name, faculty",
        )
        .bind(request.name.trim())
        .bind(request.faculty.trim())
        .fetch_one(&self.db_pool)
        .await
        .map_err(school_write_error)?;

        info!("School {} created", school.id);
        Ok(school)
    }

    pub async fn update_school(
        &self,
        school_id: i32,
        request: SchoolRequest,
    ) -> CatalogServiceResult<School> {
        request
            .validate()
            .map_err(|e| CatalogServiceError::ValidationError(e.to_string()))?;

        sqlx::query_as::<_, School>(
            "UPDATE schools SET name = $1, faculty = $2 WHERE id = $3 RETURNING id, name, faculty",
        )
        .bind(request.name.trim())
        .bind(request.faculty.trim())
        .bind(school_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(school_write_error)?
        .ok_or(CatalogServiceError::SchoolNotFound)
    }

    pub async fn delete_school(&self, school_id: i32) -> CatalogServiceResult<()> {
        let result = sqlx::query("DELETE FROM schools WHERE id = $1")
            .bind(school_id)
            .execute(&self.db_pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    CatalogServiceError::SchoolInUse
                } else {
                    CatalogServiceError::DatabaseError(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(CatalogServiceError::SchoolNotFound);
        }

        info!("School {} deleted", school_id);
        Ok(())
    }

    pub async fn list_departments(&self) -> CatalogServiceResult<Vec<Department>> {
        let departments =
            sqlx::query_as::<_, Department>("SELECT id, name FROM departments ORDER BY name")
                .fetch_all(&self.db_pool)
                .await?;
        Ok(departments)
    }

    pub async fn list_provinces(&self, department_id: i32) -> CatalogServiceResult<Vec<Province>> {
        let provinces = sqlx::query_as::<_, Province>(
            "SELECT id, department_id, name FROM provinces WHERE department_id = $1 ORDER BY name",
        )
        .bind(department_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(provinces)
    }

    pub async fn list_districts(&self, province_id: i32) -> CatalogServiceResult<Vec<District>> {
        let districts = sqlx::query_as::<_, District>(
            "SELECT id, province_id, name FROM districts WHERE province_id = $1 ORDER BY name",
        )
        .bind(province_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(districts)
    }

    pub async fn list_all_districts(&self) -> CatalogServiceResult<Vec<District>> {
        let districts =
            sqlx::query_as::<_, District>("SELECT id, province_id, name FROM districts ORDER BY name")
                .fetch_all(&self.db_pool)
                .await?;
        Ok(districts)
    }

    pub async fn list_formations(&self) -> CatalogServiceResult<Vec<NamedItem>> {
        self.named_items("SELECT id, name FROM formations ORDER BY name")
            .await
    }

    pub async fn list_specialties(&self) -> CatalogServiceResult<Vec<NamedItem>> {
        self.named_items("SELECT id, name FROM specialties ORDER BY name")
            .await
    }

    pub async fn list_classroom_types(&self) -> CatalogServiceResult<Vec<NamedItem>> {
        self.named_items("SELECT id, name FROM classroom_types ORDER BY name")
            .await
    }

    pub async fn list_pavilions(&self) -> CatalogServiceResult<Vec<NamedItem>> {
        self.named_items("SELECT id, name FROM pavilions ORDER BY name")
            .await
    }

    pub async fn create_pavilion(&self, request: PavilionRequest) -> CatalogServiceResult<NamedItem> {
        request
            .validate()
            .map_err(|e| CatalogServiceError::ValidationError(e.to_string()))?;

        let pavilion = sqlx::query_as::<_, NamedItem>(
            "INSERT INTO pavilions (name) VALUES ($1) RETURNING id, name",
        )
        .bind(request.name.trim())
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| {
            if violated_constraint(&e) == Some("pavilions_name_key") {
                CatalogServiceError::DuplicatePavilion
            } else {
                CatalogServiceError::DatabaseError(e)
            }
        })?;

        info!("Pavilion {} created", pavilion.name);
        Ok(pavilion)
    }

    async fn named_items(&self, query: &str) -> CatalogServiceResult<Vec<NamedItem>> {
        let items = sqlx::query_as::<_, NamedItem>(query)
            .fetch_all(&self.db_pool)
            .await?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_school_in_use_is_dependency_conflict() {
        let err = AppError::from(CatalogServiceError::SchoolInUse);
        assert_eq!(err.status_code().as_u16(), 409);
        assert!(matches!(err, AppError::Dependency(_)));
    }

    #[test]
    fn test_unclassified_school_error() {
        assert!(matches!(
            school_write_error(sqlx::Error::RowNotFound),
            CatalogServiceError::DatabaseError(_)
        ));
    }
}
