//! Student Service
//!
//! Back-office management of student accounts. A student spans three rows
//! (account, person, student profile) created and updated together.

use std::sync::Arc;

use log::info;
use sqlx::PgPool;
use thiserror::Error;
use validator::Validate;

use crate::models::{
    AccountStatus, CreateStudentResponse, Role, Student, StudentRequest,
};
use crate::service::email_service::{deliver_credentials, CredentialNotice, EmailService};
use crate::utils::{
    error::{is_foreign_key_violation, violated_constraint, AppError},
    security::{hash_password_with_cost, temporary_password_from_dni, DEFAULT_BCRYPT_COST},
    validation::normalize_email,
};

#[derive(Error, Debug)]
pub enum StudentServiceError {
    #[error("Student not found")]
    StudentNotFound,

    #[error("University code already registered")]
    DuplicateUniversityCode,

    #[error("Institutional email already registered")]
    DuplicateEmail,

    #[error("DNI already registered")]
    DuplicateDni,

    #[error("School not found")]
    SchoolNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Password hashing error: {0}")]
    HashingError(#[from] bcrypt::BcryptError),
}

impl StudentServiceError {
    /// Map unique and foreign-key violations raised while writing a student
    fn from_write(err: sqlx::Error) -> Self {
        match violated_constraint(&err) {
            Some("students_university_code_key") => Self::DuplicateUniversityCode,
            Some("users_email_key") => Self::DuplicateEmail,
            Some("persons_dni_key") => Self::DuplicateDni,
            _ if is_foreign_key_violation(&err) => Self::SchoolNotFound,
            _ => Self::DatabaseError(err),
        }
    }
}

impl From<StudentServiceError> for AppError {
    fn from(err: StudentServiceError) -> Self {
        match err {
            StudentServiceError::StudentNotFound => {
                AppError::NotFound("Estudiante no encontrado".to_string())
            }
            StudentServiceError::DuplicateUniversityCode => {
                AppError::Conflict("El código universitario ya está registrado".to_string())
            }
            StudentServiceError::DuplicateEmail => {
                AppError::Conflict("El correo institucional ya está registrado".to_string())
            }
            StudentServiceError::DuplicateDni => {
                AppError::Conflict("El DNI ya está registrado".to_string())
            }
            StudentServiceError::SchoolNotFound => {
                AppError::NotFound("Escuela no encontrada".to_string())
            }
            StudentServiceError::ValidationError(msg) => AppError::Validation(msg),
            StudentServiceError::DatabaseError(e) => AppError::Database(e),
            StudentServiceError::HashingError(e) => AppError::HashingError(e),
        }
    }
}

pub type StudentServiceResult<T> = Result<T, StudentServiceError>;

const STUDENT_SELECT: &str = r#"
    SELECT s.id AS student_id, u.id AS user_id, s.university_code,
           u.email AS institutional_email, p.personal_email,
           p.first_names, p.last_names, p.dni, p.phone,
           s.school_id, sc.name AS school_name, s.admission_cycle, u.status
    FROM students s
    JOIN persons p ON p.id = s.person_id
    JOIN users u ON u.id = p.user_id
    JOIN schools sc ON sc.id = s.school_id
"#;

#[derive(Clone)]
pub struct StudentService {
    db_pool: PgPool,
    bcrypt_cost: u32,
    email_service: Option<Arc<EmailService>>,
}

impl StudentService {
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

    /// Provision a student account; the temporary password is the last four DNI digits
    pub async fn create_student(
        &self,
        request: StudentRequest,
    ) -> StudentServiceResult<CreateStudentResponse> {
        request
            .validate()
            .map_err(|e| StudentServiceError::ValidationError(e.to_string()))?;

        let institutional_email = normalize_email(&request.institutional_email);
        let personal_email = request.personal_email.as_deref().map(normalize_email);
        let temporary_password = temporary_password_from_dni(&request.dni);
        let password_hash = hash_password_with_cost(&temporary_password, self.bcrypt_cost)?;
        let last_names = request.last_names();

        let mut tx = self.db_pool.begin().await?;

        let user_id: i32 = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, status) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&institutional_email)
        .bind(&password_hash)
        .bind(AccountStatus::Active)
        .fetch_one(&mut *tx)
        .await
        .map_err(StudentServiceError::from_write)?;

        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user_id)
            .bind(Role::Alumno)
            .execute(&mut *tx)
            .await?;

        let person_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO persons (user_id, first_names, last_names, dni, phone, personal_email)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(request.first_names.trim())
        .bind(&last_names)
        .bind(&request.dni)
        .bind(&request.phone)
        .bind(&personal_email)
        .fetch_one(&mut *tx)
        .await
        .map_err(StudentServiceError::from_write)?;

        let student_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO students (person_id, university_code, school_id, admission_cycle)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(person_id)
        .bind(request.university_code.trim())
        .bind(request.school_id())
        .bind(&request.admission_cycle)
        .fetch_one(&mut *tx)
        .await
        .map_err(StudentServiceError::from_write)?;

        tx.commit().await?;

        info!(
            "Student {} created with code {}",
            student_id, request.university_code
        );

        let notice = CredentialNotice {
            recipient: personal_email
                .clone()
                .unwrap_or_else(|| institutional_email.clone()),
            full_name: format!("{} {}", request.first_names.trim(), last_names),
            login_email: institutional_email.clone(),
            temporary_password,
            role_label: Role::Alumno.label().to_string(),
        };
        let email_sent = deliver_credentials(self.email_service.as_ref(), &notice).await;

        Ok(CreateStudentResponse {
            user_id,
            student_id,
            university_code: request.university_code.trim().to_string(),
            institutional_email,
            email_sent,
        })
    }

    /// Students whose account is active
    pub async fn list_active(&self) -> StudentServiceResult<Vec<Student>> {
        let query = format!(
            "{} WHERE u.status = $1 ORDER BY p.last_names, p.first_names",
            STUDENT_SELECT
        );
        let students = sqlx::query_as::<_, Student>(&query)
            .bind(AccountStatus::Active)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(students)
    }

    pub async fn get_student(&self, student_id: i32) -> StudentServiceResult<Student> {
        let query = format!("{} WHERE s.id = $1", STUDENT_SELECT);
        sqlx::query_as::<_, Student>(&query)
            .bind(student_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(StudentServiceError::StudentNotFound)
    }

    /// Replace a student's data; uniqueness is only checked against other students
    pub async fn update_student(
        &self,
        student_id: i32,
        request: StudentRequest,
    ) -> StudentServiceResult<Student> {
        request
            .validate()
            .map_err(|e| StudentServiceError::ValidationError(e.to_string()))?;

        let mut tx = self.db_pool.begin().await?;

        let ids: Option<(i32, i32)> = sqlx::query_as(
            r#"
            SELECT p.id, p.user_id FROM students s
            JOIN persons p ON p.id = s.person_id
            WHERE s.id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (person_id, user_id) = ids.ok_or(StudentServiceError::StudentNotFound)?;

        sqlx::query("UPDATE users SET email = $1, updated_at = NOW() WHERE id = $2")
            .bind(normalize_email(&request.institutional_email))
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(StudentServiceError::from_write)?;

        sqlx::query(
            r#"
            UPDATE persons
            SET first_names = $1, last_names = $2, dni = $3, phone = $4, personal_email = $5
            WHERE id = $6
            "#,
        )
        .bind(request.first_names.trim())
        .bind(request.last_names())
        .bind(&request.dni)
        .bind(&request.phone)
        .bind(request.personal_email.as_deref().map(normalize_email))
        .bind(person_id)
        .execute(&mut *tx)
        .await
        .map_err(StudentServiceError::from_write)?;

        sqlx::query(
            r#"
            UPDATE students
            SET university_code = $1, school_id = $2, admission_cycle = $3
            WHERE id = $4
            "#,
        )
        .bind(request.university_code.trim())
        .bind(request.school_id())
        .bind(&request.admission_cycle)
        .bind(student_id)
        .execute(&mut *tx)
        .await
        .map_err(StudentServiceError::from_write)?;

        tx.commit().await?;

        info!("Student {} updated", student_id);
        self.get_student(student_id).await
    }

    /// Soft delete: the account is deactivated, the rows stay
    pub async fn deactivate_student(&self, student_id: i32) -> StudentServiceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET status = $1, updated_at = NOW()
            WHERE id = (
                SELECT p.user_id FROM students s
                JOIN persons p ON p.id = s.person_id
                WHERE s.id = $2
            )
            "#,
        )
        .bind(AccountStatus::Inactive)
        .bind(student_id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StudentServiceError::StudentNotFound);
        }

        info!("Student {} deactivated", student_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_errors_are_conflicts() {
        for err in [
            StudentServiceError::DuplicateUniversityCode,
            StudentServiceError::DuplicateEmail,
            StudentServiceError::DuplicateDni,
        ] {
            assert_eq!(AppError::from(err).status_code().as_u16(), 409);
        }
    }

    #[test]
    fn test_unclassified_write_error_stays_a_database_error() {
        let err = StudentServiceError::from_write(sqlx::Error::RowNotFound);
        assert!(matches!(err, StudentServiceError::DatabaseError(_)));
    }
}
