//! Administrator Service
//!
//! Super-administrator management of administrative staff. Staff addresses
//! and passwords are generated here; the plaintext password is only ever
//! returned to the caller and mailed.

use std::sync::Arc;

use log::info;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use validator::Validate;

use crate::models::{
    AccountStatus, AdminRequest, Administrator, CreateAdminResponse, RecordStatus, Role,
};
use crate::service::email_service::{deliver_credentials, CredentialNotice, EmailService};
use crate::utils::{
    error::{is_foreign_key_violation, violated_constraint, AppError},
    security::{
        generate_password, generate_staff_email, hash_password_with_cost, DEFAULT_BCRYPT_COST,
        GENERATED_PASSWORD_LENGTH,
    },
    validation::normalize_email,
};

/// Collision suffixes tried before giving up on a generated address
const MAX_EMAIL_SUFFIX: u32 = 99;

#[derive(Error, Debug)]
pub enum AdminServiceError {
    #[error("Administrator not found")]
    AdminNotFound,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("DNI already registered")]
    DuplicateDni,

    #[error("Referenced district, formation, specialty or school not found")]
    ReferenceNotFound,

    #[error("Could not generate a free email address")]
    EmailExhausted,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Password hashing error: {0}")]
    HashingError(#[from] bcrypt::BcryptError),
}

impl AdminServiceError {
    fn from_write(err: sqlx::Error) -> Self {
        match violated_constraint(&err) {
            Some("users_email_key") => Self::DuplicateEmail,
            Some("persons_dni_key") => Self::DuplicateDni,
            _ if is_foreign_key_violation(&err) => Self::ReferenceNotFound,
            _ => Self::DatabaseError(err),
        }
    }
}

impl From<AdminServiceError> for AppError {
    fn from(err: AdminServiceError) -> Self {
        match err {
            AdminServiceError::AdminNotFound => {
                AppError::NotFound("Administrador no encontrado".to_string())
            }
            AdminServiceError::DuplicateEmail => {
                AppError::Conflict("El correo ya está registrado".to_string())
            }
            AdminServiceError::DuplicateDni => {
                AppError::Conflict("El DNI ya está registrado".to_string())
            }
            AdminServiceError::ReferenceNotFound => AppError::NotFound(
                "Distrito, formación, especialidad o escuela no encontrada".to_string(),
            ),
            AdminServiceError::EmailExhausted => {
                AppError::Conflict("No se pudo generar un correo disponible".to_string())
            }
            AdminServiceError::ValidationError(msg) => AppError::Validation(msg),
            AdminServiceError::DatabaseError(e) => AppError::Database(e),
            AdminServiceError::HashingError(e) => AppError::HashingError(e),
        }
    }
}

pub type AdminServiceResult<T> = Result<T, AdminServiceError>;

const ADMIN_SELECT: &str = r#"
    SELECT ad.id AS admin_id, u.id AS user_id, u.email,
           p.first_names, p.last_names, p.dni, p.phone, p.birth_date,
           ad.address_detail, ad.district_id, ad.formation_id, ad.specialty_id,
           ad.work_experience, ad.school_id, ad.status
    FROM administrators ad
    JOIN persons p ON p.id = ad.person_id
    JOIN users u ON u.id = p.user_id
"#;

#[derive(Clone)]
pub struct AdminService {
    db_pool: PgPool,
    bcrypt_cost: u32,
    email_service: Option<Arc<EmailService>>,
}

impl AdminService {
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

    /// Provision an administrator with a generated address and password
    pub async fn create_admin(
        &self,
        request: AdminRequest,
    ) -> AdminServiceResult<CreateAdminResponse> {
        request
            .validate()
            .map_err(|e| AdminServiceError::ValidationError(e.to_string()))?;

        let generated_password = generate_password(GENERATED_PASSWORD_LENGTH);
        let password_hash = hash_password_with_cost(&generated_password, self.bcrypt_cost)?;
        let personal_email = request.personal_email.as_deref().map(normalize_email);

        let mut tx = self.db_pool.begin().await?;

        let email = free_staff_email(&mut tx, &request.first_names, &request.last_names).await?;

        let user_id: i32 = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, status) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(AccountStatus::Active)
        .fetch_one(&mut *tx)
        .await
        .map_err(AdminServiceError::from_write)?;

        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user_id)
            .bind(Role::Admin)
            .execute(&mut *tx)
            .await?;

        let person_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO persons (user_id, first_names, last_names, dni, phone, birth_date, personal_email)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(request.first_names.trim())
        .bind(request.last_names.trim())
        .bind(&request.dni)
        .bind(&request.phone)
        .bind(request.birth_date)
        .bind(&personal_email)
        .fetch_one(&mut *tx)
        .await
        .map_err(AdminServiceError::from_write)?;

        let admin_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO administrators
                (person_id, address_detail, district_id, formation_id, specialty_id,
                 work_experience, school_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(person_id)
        .bind(&request.address_detail)
        .bind(request.district_id)
        .bind(request.formation_id)
        .bind(request.specialty_id)
        .bind(&request.work_experience)
        .bind(request.school_id)
        .bind(RecordStatus::Active)
        .fetch_one(&mut *tx)
        .await
        .map_err(AdminServiceError::from_write)?;

        tx.commit().await?;

        info!("Administrator {} created as {}", admin_id, email);

        let notice = CredentialNotice {
            recipient: personal_email.unwrap_or_else(|| email.clone()),
            full_name: format!("{} {}", request.first_names.trim(), request.last_names.trim()),
            login_email: email.clone(),
            temporary_password: generated_password.clone(),
            role_label: Role::Admin.label().to_string(),
        };
        let email_sent = deliver_credentials(self.email_service.as_ref(), &notice).await;

        Ok(CreateAdminResponse {
            admin_id,
            user_id,
            email,
            generated_password,
            email_sent,
        })
    }

    pub async fn list_admins(&self) -> AdminServiceResult<Vec<Administrator>> {
        let query = format!("{} ORDER BY p.last_names, p.first_names", ADMIN_SELECT);
        let admins = sqlx::query_as::<_, Administrator>(&query)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(admins)
    }

    pub async fn get_admin(&self, admin_id: i32) -> AdminServiceResult<Administrator> {
        let query = format!("{} WHERE ad.id = $1", ADMIN_SELECT);
        sqlx::query_as::<_, Administrator>(&query)
            .bind(admin_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(AdminServiceError::AdminNotFound)
    }

    /// Update personal and profile data; the login address is left as generated
    pub async fn update_admin(
        &self,
        admin_id: i32,
        request: AdminRequest,
    ) -> AdminServiceResult<Administrator> {
        request
            .validate()
            .map_err(|e| AdminServiceError::ValidationError(e.to_string()))?;

        let mut tx = self.db_pool.begin().await?;

        let person_id: i32 = sqlx::query_scalar("SELECT person_id FROM administrators WHERE id = $1")
            .bind(admin_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AdminServiceError::AdminNotFound)?;

        sqlx::query(
            r#"
            UPDATE persons
            SET first_names = $1, last_names = $2, dni = $3, phone = $4,
                birth_date = $5, personal_email = COALESCE($6, personal_email)
            WHERE id = $7
            "#,
        )
        .bind(request.first_names.trim())
        .bind(request.last_names.trim())
        .bind(&request.dni)
        .bind(&request.phone)
        .bind(request.birth_date)
        .bind(request.personal_email.as_deref().map(normalize_email))
        .bind(person_id)
        .execute(&mut *tx)
        .await
        .map_err(AdminServiceError::from_write)?;

        sqlx::query(
            r#"
            UPDATE administrators
            SET address_detail = $1, district_id = $2, formation_id = $3, specialty_id = $4,
                work_experience = $5, school_id = $6
            WHERE id = $7
            "#,
        )
        .bind(&request.address_detail)
        .bind(request.district_id)
        .bind(request.formation_id)
        .bind(request.specialty_id)
        .bind(&request.work_experience)
        .bind(request.school_id)
        .bind(admin_id)
        .execute(&mut *tx)
        .await
        .map_err(AdminServiceError::from_write)?;

        tx.commit().await?;

        info!("Administrator {} updated", admin_id);
        self.get_admin(admin_id).await
    }

    /// Hard delete: removing the account cascades to the person and profile rows
    pub async fn delete_admin(&self, admin_id: i32) -> AdminServiceResult<()> {
        let mut tx = self.db_pool.begin().await?;

        let user_id = admin_user_id(&mut tx, admin_id).await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Administrator {} deleted", admin_id);
        Ok(())
    }

    /// Enable or disable both the profile and the login account
    pub async fn set_status(
        &self,
        admin_id: i32,
        status: RecordStatus,
    ) -> AdminServiceResult<Administrator> {
        let mut tx = self.db_pool.begin().await?;

        let user_id = admin_user_id(&mut tx, admin_id).await?;

        sqlx::query("UPDATE administrators SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(admin_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(AccountStatus::from(status))
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Administrator {} set to {:?}", admin_id, status);
        self.get_admin(admin_id).await
    }
}

async fn admin_user_id(conn: &mut PgConnection, admin_id: i32) -> AdminServiceResult<i32> {
    sqlx::query_scalar(
        r#"
        SELECT p.user_id FROM administrators ad
        JOIN persons p ON p.id = ad.person_id
        WHERE ad.id = $1
        "#,
    )
    .bind(admin_id)
    .fetch_optional(conn)
    .await?
    .ok_or(AdminServiceError::AdminNotFound)
}

/// First generated staff address not already taken, trying numeric suffixes in order
async fn free_staff_email(
    conn: &mut PgConnection,
    first_names: &str,
    last_names: &str,
) -> AdminServiceResult<String> {
    let candidates = std::iter::once(None).chain((1..=MAX_EMAIL_SUFFIX).map(Some));

    for suffix in candidates {
        let email = generate_staff_email(first_names, last_names, suffix);
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&email)
            .fetch_one(&mut *conn)
            .await?;

        if !taken {
            return Ok(email);
        }
    }

    Err(AdminServiceError::EmailExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let status = |e: AdminServiceError| AppError::from(e).status_code().as_u16();
        assert_eq!(status(AdminServiceError::AdminNotFound), 404);
        assert_eq!(status(AdminServiceError::DuplicateDni), 409);
        assert_eq!(status(AdminServiceError::ReferenceNotFound), 404);
    }
}
