//! Course Service
//!
//! Course catalogue and the prerequisite graph.
//!
//! A course that is referenced by an assignment cannot be deleted. Otherwise
//! the course goes away together with every prerequisite edge touching it.

use log::info;
use sqlx::PgPool;
use thiserror::Error;
use validator::Validate;

use crate::models::course::{group_prerequisites, PrerequisiteRow};
use crate::models::{
    Course, CourseRequest, CourseWithPrerequisites, Prerequisite, PrerequisiteRequest,
    RecordStatus,
};
use crate::utils::{
    error::{is_foreign_key_violation, violated_constraint, AppError},
    validation::{messages, valid_course_code},
};

#[derive(Error, Debug)]
pub enum CourseServiceError {
    #[error("Course not found")]
    CourseNotFound,

    #[error("Prerequisite not found")]
    PrerequisiteNotFound,

    #[error("Course code already exists")]
    DuplicateCode,

    #[error("Prerequisite already defined")]
    DuplicatePrerequisite,

    #[error("A course cannot be its own prerequisite")]
    SelfPrerequisite,

    #[error("Course is referenced by assignments or academic records")]
    CourseInUse,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl CourseServiceError {
    fn from_write(err: sqlx::Error) -> Self {
        match violated_constraint(&err) {
            Some("courses_code_key") => Self::DuplicateCode,
            Some("prerequisites_course_required_key") => Self::DuplicatePrerequisite,
            Some("prerequisites_no_self_loop") => Self::SelfPrerequisite,
            _ if is_foreign_key_violation(&err) => Self::CourseInUse,
            _ => Self::DatabaseError(err),
        }
    }
}

impl From<CourseServiceError> for AppError {
    fn from(err: CourseServiceError) -> Self {
        match err {
            CourseServiceError::CourseNotFound => {
                AppError::NotFound("Curso no encontrado".to_string())
            }
            CourseServiceError::PrerequisiteNotFound => {
                AppError::NotFound("Prerrequisito no encontrado".to_string())
            }
            CourseServiceError::DuplicateCode => {
                AppError::Conflict("El código del curso ya existe".to_string())
            }
            CourseServiceError::DuplicatePrerequisite => {
                AppError::Conflict("El prerrequisito ya está registrado".to_string())
            }
            CourseServiceError::SelfPrerequisite => {
                AppError::Validation("Un curso no puede ser prerrequisito de sí mismo".to_string())
            }
            CourseServiceError::CourseInUse => AppError::Dependency(
                "No se puede eliminar el curso porque tiene asignaciones o registros asociados"
                    .to_string(),
            ),
            CourseServiceError::ValidationError(msg) => AppError::Validation(msg),
            CourseServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

pub type CourseServiceResult<T> = Result<T, CourseServiceError>;

const COURSE_COLUMNS: &str = "id, code, name, credits, cycle, theory_hours, practice_hours, \
                              course_type, status, created_at";

const PREREQUISITE_SELECT: &str = r#"
    SELECT pr.id, pr.course_id, pr.required_course_id,
           rc.code AS required_code, rc.name AS required_name
    FROM prerequisites pr
    JOIN courses rc ON rc.id = pr.required_course_id
"#;

/// Field checks that `Validate` cannot express
fn check_course_request(request: &CourseRequest) -> CourseServiceResult<()> {
    request
        .validate()
        .map_err(|e| CourseServiceError::ValidationError(e.to_string()))?;

    if !valid_course_code(request.code.trim(), request.course_type.trim()) {
        return Err(CourseServiceError::ValidationError(
            messages::INVALID_COURSE_CODE.to_string(),
        ));
    }

    Ok(())
}

#[derive(Clone)]
pub struct CourseService {
    db_pool: PgPool,
}

impl CourseService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn create_course(&self, request: CourseRequest) -> CourseServiceResult<Course> {
        check_course_request(&request)?;

        let query = format!(
            r#"
            INSERT INTO courses
                (code, name, credits, cycle, theory_hours, practice_hours, course_type, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            COURSE_COLUMNS
        );

        let course = sqlx::query_as::<_, Course>(&query)
            .bind(request.code.trim())
            .bind(request.name.trim())
            .bind(request.credits)
            .bind(request.cycle)
            .bind(request.theory_hours)
            .bind(request.practice_hours)
            .bind(request.course_type.trim())
            .bind(request.status.unwrap_or_default())
            .bind(request.created_by)
            .fetch_one(&self.db_pool)
            .await
            .map_err(CourseServiceError::from_write)?;

        info!("Course {} ({}) created", course.code, course.id);
        Ok(course)
    }

    pub async fn get_course(&self, course_id: i32) -> CourseServiceResult<Course> {
        let query = format!("SELECT {} FROM courses WHERE id = $1", COURSE_COLUMNS);
        sqlx::query_as::<_, Course>(&query)
            .bind(course_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(CourseServiceError::CourseNotFound)
    }

    /// All courses, optionally restricted to one curriculum cycle
    pub async fn list_courses(&self, cycle: Option<i16>) -> CourseServiceResult<Vec<Course>> {
        let query = format!(
            "SELECT {} FROM courses WHERE ($1::SMALLINT IS NULL OR cycle = $1) ORDER BY cycle, code",
            COURSE_COLUMNS
        );
        let courses = sqlx::query_as::<_, Course>(&query)
            .bind(cycle)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(courses)
    }

    pub async fn update_course(
        &self,
        course_id: i32,
        request: CourseRequest,
    ) -> CourseServiceResult<Course> {
        check_course_request(&request)?;

        let query = format!(
            r#"
            UPDATE courses
            SET code = $1, name = $2, credits = $3, cycle = $4, theory_hours = $5,
                practice_hours = $6, course_type = $7, status = COALESCE($8, status)
            WHERE id = $9
            RETURNING {}
            "#,
            COURSE_COLUMNS
        );

        let course = sqlx::query_as::<_, Course>(&query)
            .bind(request.code.trim())
            .bind(request.name.trim())
            .bind(request.credits)
            .bind(request.cycle)
            .bind(request.theory_hours)
            .bind(request.practice_hours)
            .bind(request.course_type.trim())
            .bind(request.status)
            .bind(course_id)
            .fetch_optional(&self.db_pool)
            .await
            .map_err(CourseServiceError::from_write)?
            .ok_or(CourseServiceError::CourseNotFound)?;

        info!("Course {} updated", course_id);
        Ok(course)
    }

    /// Delete a course with its prerequisite edges, unless it is scheduled
    pub async fn delete_course(&self, course_id: i32) -> CourseServiceResult<()> {
        let mut tx = self.db_pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)")
            .bind(course_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(CourseServiceError::CourseNotFound);
        }

        let scheduled: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM assignments WHERE course_id = $1)")
                .bind(course_id)
                .fetch_one(&mut *tx)
                .await?;
        if scheduled {
            return Err(CourseServiceError::CourseInUse);
        }

        let edges = sqlx::query(
            "DELETE FROM prerequisites WHERE course_id = $1 OR required_course_id = $1",
        )
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(CourseServiceError::from_write)?;

        tx.commit().await?;

        info!(
            "Course {} deleted with {} prerequisite edges",
            course_id,
            edges.rows_affected()
        );
        Ok(())
    }

    /// Record that `course_id` requires `required_course_id`
    pub async fn add_prerequisite(
        &self,
        request: PrerequisiteRequest,
    ) -> CourseServiceResult<Prerequisite> {
        if request.course_id == request.required_course_id {
            return Err(CourseServiceError::SelfPrerequisite);
        }

        let mut tx = self.db_pool.begin().await?;

        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses WHERE id IN ($1, $2)")
            .bind(request.course_id)
            .bind(request.required_course_id)
            .fetch_one(&mut *tx)
            .await?;
        if found < 2 {
            return Err(CourseServiceError::CourseNotFound);
        }

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO prerequisites (course_id, required_course_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(request.course_id)
        .bind(request.required_course_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(CourseServiceError::from_write)?;

        let query = format!("{} WHERE pr.id = $1", PREREQUISITE_SELECT);
        let prerequisite = sqlx::query_as::<_, Prerequisite>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Course {} now requires course {}",
            request.course_id, request.required_course_id
        );
        Ok(prerequisite)
    }

    pub async fn list_prerequisites(&self, course_id: i32) -> CourseServiceResult<Vec<Prerequisite>> {
        self.get_course(course_id).await?;

        let query = format!("{} WHERE pr.course_id = $1 ORDER BY rc.code", PREREQUISITE_SELECT);
        let prerequisites = sqlx::query_as::<_, Prerequisite>(&query)
            .bind(course_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(prerequisites)
    }

    /// Every course that has prerequisites, each with its list
    pub async fn list_all_prerequisites(&self) -> CourseServiceResult<Vec<CourseWithPrerequisites>> {
        let rows = sqlx::query_as::<_, PrerequisiteRow>(
            r#"
            SELECT c.id AS course_id, c.code AS course_code, c.name AS course_name,
                   pr.id, pr.required_course_id,
                   rc.code AS required_code, rc.name AS required_name
            FROM prerequisites pr
            JOIN courses c ON c.id = pr.course_id
            JOIN courses rc ON rc.id = pr.required_course_id
            WHERE c.status = $1
            ORDER BY c.cycle, c.code, c.id, rc.code
            "#,
        )
        .bind(RecordStatus::Active)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(group_prerequisites(rows))
    }

    pub async fn delete_prerequisite(&self, prerequisite_id: i32) -> CourseServiceResult<()> {
        let result = sqlx::query("DELETE FROM prerequisites WHERE id = $1")
            .bind(prerequisite_id)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CourseServiceError::PrerequisiteNotFound);
        }

        info!("Prerequisite {} deleted", prerequisite_id);
        Ok(())
    }

    /// Remove every prerequisite of a course; returns how many were removed
    pub async fn clear_prerequisites(&self, course_id: i32) -> CourseServiceResult<u64> {
        self.get_course(course_id).await?;

        let result = sqlx::query("DELETE FROM prerequisites WHERE course_id = $1")
            .bind(course_id)
            .execute(&self.db_pool)
            .await?;

        info!(
            "{} prerequisites removed from course {}",
            result.rows_affected(),
            course_id
        );
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fixtures;

    fn request(code: &str, course_type: &str) -> CourseRequest {
        CourseRequest {
            code: code.to_string(),
            name: "Base de Datos".to_string(),
            credits: 4,
            cycle: 5,
            theory_hours: 2,
            practice_hours: 4,
            course_type: course_type.to_string(),
            status: None,
            created_by: None,
        }
    }

    #[test]
    fn test_course_code_format_depends_on_type() {
        assert!(check_course_request(&request("10502", "Obligatorio")).is_ok());
        assert!(check_course_request(&request("EL001V", "Electivo")).is_ok());
        assert!(check_course_request(&request("EL001", "Electivo")).is_err());
        assert!(check_course_request(&request("EL001V", "Obligatorio")).is_err());
    }

    #[test]
    fn test_error_mapping() {
        let status = |e: CourseServiceError| AppError::from(e).status_code().as_u16();
        assert_eq!(status(CourseServiceError::SelfPrerequisite), 400);
        assert_eq!(status(CourseServiceError::DuplicatePrerequisite), 409);
        assert_eq!(status(CourseServiceError::CourseInUse), 409);
        assert_eq!(status(CourseServiceError::CourseNotFound), 404);
    }

    #[sqlx::test]
    async fn test_scheduled_course_cannot_be_deleted(pool: PgPool) {
        let course = fixtures::assigned_course(&pool).await;
        let service = CourseService::new(pool);

        let err = service.delete_course(course.course_id).await.unwrap_err();
        assert!(matches!(err, CourseServiceError::CourseInUse));
        assert_eq!(AppError::from(err).status_code().as_u16(), 409);
        assert!(service.get_course(course.course_id).await.is_ok());
    }

    #[sqlx::test]
    async fn test_delete_removes_prerequisite_edges(pool: PgPool) {
        let basic = fixtures::insert_course(&pool, "INF101").await;
        let advanced = fixtures::insert_course(&pool, "INF202").await;
        let service = CourseService::new(pool.clone());
        service
            .add_prerequisite(PrerequisiteRequest {
                course_id: advanced,
                required_course_id: basic,
            })
            .await
            .unwrap();

        service.delete_course(basic).await.unwrap();

        assert!(service.list_prerequisites(advanced).await.unwrap().is_empty());
        assert!(matches!(
            service.delete_course(basic).await,
            Err(CourseServiceError::CourseNotFound)
        ));
    }
}
