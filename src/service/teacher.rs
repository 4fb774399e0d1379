//! Teacher Service
//!
//! Back-office teacher management plus the teacher's own profile, course
//! list and rosters.

use std::sync::Arc;

use log::info;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use validator::Validate;

use crate::models::{
    AccountStatus, AuditEntry, CreateTeacherRequest, CreateTeacherResponse, EnrolledStudent, Role, Teacher,
    TeacherCourse, UpdateProfileRequest, UpdateTeacherRequest,
};
use crate::service::audit;
use crate::service::email_service::{deliver_credentials, CredentialNotice, EmailService};
use crate::utils::{
    error::{is_foreign_key_violation, violated_constraint, AppError},
    security::{hash_password_with_cost, DEFAULT_BCRYPT_COST},
    validation::normalize_email,
};

#[derive(Error, Debug)]
pub enum TeacherServiceError {
    #[error("Teacher not found")]
    TeacherNotFound,

    #[error("Assignment not found for this teacher")]
    AssignmentNotFound,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("DNI already registered")]
    DuplicateDni,

    #[error("Referenced school or district not found")]
    ReferenceNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Password hashing error: {0}")]
    HashingError(#[from] bcrypt::BcryptError),
}

impl TeacherServiceError {
    fn from_write(err: sqlx::Error) -> Self {
        match violated_constraint(&err) {
            Some("users_email_key") => Self::DuplicateEmail,
            Some("persons_dni_key") => Self::DuplicateDni,
            _ if is_foreign_key_violation(&err) => Self::ReferenceNotFound,
            _ => Self::DatabaseError(err),
        }
    }
}

impl From<TeacherServiceError> for AppError {
    fn from(err: TeacherServiceError) -> Self {
        match err {
            TeacherServiceError::TeacherNotFound => {
                AppError::NotFound("Docente no encontrado".to_string())
            }
            TeacherServiceError::AssignmentNotFound => {
                AppError::NotFound("Asignación no encontrada para este docente".to_string())
            }
            TeacherServiceError::DuplicateEmail => {
                AppError::Conflict("El correo ya está registrado".to_string())
            }
            TeacherServiceError::DuplicateDni => {
                AppError::Conflict("El DNI ya está registrado".to_string())
            }
            TeacherServiceError::ReferenceNotFound => {
                AppError::NotFound("Escuela o distrito no encontrado".to_string())
            }
            TeacherServiceError::ValidationError(msg) => AppError::Validation(msg),
            TeacherServiceError::DatabaseError(e) => AppError::Database(e),
            TeacherServiceError::HashingError(e) => AppError::HashingError(e),
        }
    }
}

pub type TeacherServiceResult<T> = Result<T, TeacherServiceError>;

const TEACHER_SELECT: &str = r#"
    SELECT t.id AS teacher_id, u.id AS user_id, t.teacher_code, u.email,
           p.first_names, p.last_names, p.dni, p.phone,
           t.school_id, sc.name AS school_name,
           a.detail AS address, a.district_id, u.status
    FROM teachers t
    JOIN persons p ON p.id = t.person_id
    JOIN users u ON u.id = p.user_id
    JOIN schools sc ON sc.id = t.school_id
    LEFT JOIN addresses a ON a.id = t.address_id
"#;

const ENROLLED_STUDENT_SELECT: &str = r#"
    SELECT st.id AS student_id, st.university_code, p.first_names, p.last_names,
           u.email, a.id AS assignment_id, c.id AS course_id, c.name AS course_name
    FROM assignments a
    JOIN courses c ON c.id = a.course_id
    JOIN enrollments e ON e.assignment_id = a.id AND e.status = 'ACTIVE'
    JOIN students st ON st.id = e.student_id
    JOIN persons p ON p.id = st.person_id
    JOIN users u ON u.id = p.user_id
"#;

#[derive(Clone)]
pub struct TeacherService {
    db_pool: PgPool,
    bcrypt_cost: u32,
    email_service: Option<Arc<EmailService>>,
}

impl TeacherService {
    pub fn new(db_pool: PgPool) -> Self {
        Self {
            db_pool,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            email_service: None,
        }
    }

    pub fn with_email_service(db_pool: PgPool, email_service: Option<Arc<EmailService>>) -> Self {
        Self {
            email_service,
            ..Self::new(db_pool)
        }
    }

    pub fn with_bcrypt_cost(mut self, bcrypt_cost: u32) -> Self {
        self.bcrypt_cost = bcrypt_cost;
        self
    }

    /// Provision a teacher account; the teacher code comes from a database sequence
    pub async fn create_teacher(
        &self,
        request: CreateTeacherRequest,
    ) -> TeacherServiceResult<CreateTeacherResponse> {
        request
            .validate()
            .map_err(|e| TeacherServiceError::ValidationError(e.to_string()))?;

        let email = normalize_email(&request.email);
        let password_hash = hash_password_with_cost(&request.password, self.bcrypt_cost)?;

        let mut tx = self.db_pool.begin().await?;

        let user_id: i32 = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, status) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(AccountStatus::Active)
        .fetch_one(&mut *tx)
        .await
        .map_err(TeacherServiceError::from_write)?;

        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user_id)
            .bind(Role::Docente)
            .execute(&mut *tx)
            .await?;

        let person_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO persons (user_id, first_names, last_names, dni, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(request.first_names.trim())
        .bind(request.last_names.trim())
        .bind(&request.dni)
        .bind(&request.phone)
        .fetch_one(&mut *tx)
        .await
        .map_err(TeacherServiceError::from_write)?;

        let address_id = match request.address.as_deref() {
            Some(detail) => Some(insert_address(&mut tx, detail, request.district_id).await?),
            None => None,
        };

        let (teacher_id, teacher_code): (i32, String) = sqlx::query_as(
            r#"
            INSERT INTO teachers (person_id, school_id, address_id)
            VALUES ($1, $2, $3)
            RETURNING id, teacher_code
            "#,
        )
        .bind(person_id)
        .bind(request.school_id)
        .bind(address_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(TeacherServiceError::from_write)?;

        tx.commit().await?;

        info!("Teacher {} created with code {}", teacher_id, teacher_code);

        let notice = CredentialNotice {
            recipient: email.clone(),
            full_name: format!("{} {}", request.first_names.trim(), request.last_names.trim()),
            login_email: email.clone(),
            temporary_password: request.password.clone(),
            role_label: Role::Docente.label().to_string(),
        };
        let email_sent = deliver_credentials(self.email_service.as_ref(), &notice).await;

        Ok(CreateTeacherResponse {
            user_id,
            teacher_id,
            teacher_code,
            email,
            email_sent,
        })
    }

    pub async fn list_teachers(&self) -> TeacherServiceResult<Vec<Teacher>> {
        let query = format!("{} ORDER BY p.last_names, p.first_names", TEACHER_SELECT);
        let teachers = sqlx::query_as::<_, Teacher>(&query)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(teachers)
    }

    pub async fn get_teacher(&self, teacher_id: i32) -> TeacherServiceResult<Teacher> {
        let query = format!("{} WHERE t.id = $1", TEACHER_SELECT);
        sqlx::query_as::<_, Teacher>(&query)
            .bind(teacher_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(TeacherServiceError::TeacherNotFound)
    }

    /// Back-office edit of names, phone, school and optionally the password
    pub async fn update_teacher(
        &self,
        teacher_id: i32,
        request: UpdateTeacherRequest,
    ) -> TeacherServiceResult<Teacher> {
        request
            .validate()
            .map_err(|e| TeacherServiceError::ValidationError(e.to_string()))?;

        let mut tx = self.db_pool.begin().await?;
        let (person_id, user_id) = teacher_owner(&mut tx, teacher_id).await?;

        sqlx::query(
            "UPDATE persons SET first_names = $1, last_names = $2, phone = $3 WHERE id = $4",
        )
        .bind(request.first_names.trim())
        .bind(request.last_names.trim())
        .bind(&request.phone)
        .bind(person_id)
        .execute(&mut *tx)
        .await?;

        if let Some(school_id) = request.school_id {
            sqlx::query("UPDATE teachers SET school_id = $1 WHERE id = $2")
                .bind(school_id)
                .bind(teacher_id)
                .execute(&mut *tx)
                .await
                .map_err(TeacherServiceError::from_write)?;
        }

        if let Some(password) = request.password.as_deref() {
            let password_hash = hash_password_with_cost(password, self.bcrypt_cost)?;
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(&password_hash)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!("Teacher {} updated", teacher_id);
        self.get_teacher(teacher_id).await
    }

    /// Soft delete: the account is deactivated
    pub async fn deactivate_teacher(&self, teacher_id: i32) -> TeacherServiceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET status = $1, updated_at = NOW()
            WHERE id = (
                SELECT p.user_id FROM teachers t
                JOIN persons p ON p.id = t.person_id
                WHERE t.id = $2
            )
            "#,
        )
        .bind(AccountStatus::Inactive)
        .bind(teacher_id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TeacherServiceError::TeacherNotFound);
        }

        info!("Teacher {} deactivated", teacher_id);
        Ok(())
    }

    /// Account id behind a teacher profile
    pub async fn user_id_for(&self, teacher_id: i32) -> TeacherServiceResult<i32> {
        sqlx::query_scalar(
            r#"
            SELECT p.user_id FROM teachers t
            JOIN persons p ON p.id = t.person_id
            WHERE t.id = $1
            "#,
        )
        .bind(teacher_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(TeacherServiceError::TeacherNotFound)
    }

    /// Self-service profile edit: phone and address
    pub async fn update_profile(
        &self,
        teacher_id: i32,
        request: UpdateProfileRequest,
    ) -> TeacherServiceResult<Teacher> {
        request
            .validate()
            .map_err(|e| TeacherServiceError::ValidationError(e.to_string()))?;

        let mut tx = self.db_pool.begin().await?;
        let (person_id, _) = teacher_owner(&mut tx, teacher_id).await?;

        if let Some(phone) = request.phone.as_deref() {
            sqlx::query("UPDATE persons SET phone = $1 WHERE id = $2")
                .bind(phone)
                .bind(person_id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(detail) = request.address.as_deref() {
            let address_id: Option<i32> =
                sqlx::query_scalar("SELECT address_id FROM teachers WHERE id = $1")
                    .bind(teacher_id)
                    .fetch_one(&mut *tx)
                    .await?;

            match address_id {
                Some(address_id) => {
                    sqlx::query(
                        r#"
                        UPDATE addresses
                        SET detail = $1, district_id = COALESCE($2, district_id)
                        WHERE id = $3
                        "#,
                    )
                    .bind(detail)
                    .bind(request.district_id)
                    .bind(address_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(TeacherServiceError::from_write)?;
                }
                None => {
                    let address_id = insert_address(&mut tx, detail, request.district_id).await?;
                    sqlx::query("UPDATE teachers SET address_id = $1 WHERE id = $2")
                        .bind(address_id)
                        .bind(teacher_id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;

        info!("Teacher {} updated their profile", teacher_id);
        self.get_teacher(teacher_id).await
    }

    /// Courses the teacher is assigned to, one row per assignment
    pub async fn list_courses(&self, teacher_id: i32) -> TeacherServiceResult<Vec<TeacherCourse>> {
        let courses = sqlx::query_as::<_, TeacherCourse>(
            r#"
            SELECT a.id AS assignment_id, c.id AS course_id, c.code AS course_code,
                   c.name AS course_name, s.code AS section_code, tb.block_code,
                   COUNT(e.id) FILTER (WHERE e.status = 'ACTIVE') AS enrolled
            FROM assignments a
            JOIN courses c ON c.id = a.course_id
            JOIN sections s ON s.id = a.section_id
            JOIN time_blocks tb ON tb.id = a.time_block_id
            LEFT JOIN enrollments e ON e.assignment_id = a.id
            WHERE a.teacher_id = $1
            GROUP BY a.id, c.id, s.code, tb.block_code, tb.day, tb.start_time
            ORDER BY tb.day, tb.start_time
            "#,
        )
        .bind(teacher_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(courses)
    }

    /// Every student enrolled in any of the teacher's assignments
    pub async fn list_students(
        &self,
        teacher_id: i32,
    ) -> TeacherServiceResult<Vec<EnrolledStudent>> {
        let query = format!(
            "{} WHERE a.teacher_id = $1 ORDER BY c.name, p.last_names, p.first_names",
            ENROLLED_STUDENT_SELECT
        );
        let students = sqlx::query_as::<_, EnrolledStudent>(&query)
            .bind(teacher_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(students)
    }

    /// Roster of one assignment, which must belong to the teacher
    pub async fn assignment_roster(
        &self,
        teacher_id: i32,
        assignment_id: i32,
    ) -> TeacherServiceResult<Vec<EnrolledStudent>> {
        let owns: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM assignments WHERE id = $1 AND teacher_id = $2)",
        )
        .bind(assignment_id)
        .bind(teacher_id)
        .fetch_one(&self.db_pool)
        .await?;

        if !owns {
            return Err(TeacherServiceError::AssignmentNotFound);
        }

        let query = format!(
            "{} WHERE a.id = $1 ORDER BY p.last_names, p.first_names",
            ENROLLED_STUDENT_SELECT
        );
        let students = sqlx::query_as::<_, EnrolledStudent>(&query)
            .bind(assignment_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(students)
    }

    /// Latest audit entries written on behalf of the teacher
    pub async fn activity(
        &self,
        teacher_id: i32,
        limit: i64,
    ) -> TeacherServiceResult<Vec<AuditEntry>> {
        let entries = audit::recent_for_teacher(&self.db_pool, teacher_id, limit.clamp(1, 200)).await?;
        Ok(entries)
    }
}

/// Person and account ids of a teacher, or `TeacherNotFound`
async fn teacher_owner(
    conn: &mut PgConnection,
    teacher_id: i32,
) -> TeacherServiceResult<(i32, i32)> {
    let ids: Option<(i32, i32)> = sqlx::query_as(
        r#"
        SELECT p.id, p.user_id FROM teachers t
        JOIN persons p ON p.id = t.person_id
        WHERE t.id = $1
        "#,
    )
    .bind(teacher_id)
    .fetch_optional(conn)
    .await?;

    ids.ok_or(TeacherServiceError::TeacherNotFound)
}

async fn insert_address(
    conn: &mut PgConnection,
    detail: &str,
    district_id: Option<i32>,
) -> TeacherServiceResult<i32> {
    sqlx::query_scalar("INSERT INTO addresses (detail, district_id) VALUES ($1, $2) RETURNING id")
        .bind(detail.trim())
        .bind(district_id)
        .fetch_one(conn)
        .await
        .map_err(TeacherServiceError::from_write)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let status = |e: TeacherServiceError| AppError::from(e).status_code().as_u16();
        assert_eq!(status(TeacherServiceError::TeacherNotFound), 404);
        assert_eq!(status(TeacherServiceError::DuplicateEmail), 409);
        assert_eq!(status(TeacherServiceError::DuplicateDni), 409);
        assert_eq!(status(TeacherServiceError::ValidationError("x".into())), 400);
    }
}
