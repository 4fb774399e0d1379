//! Authentication Service
//!
//! Role-scoped login, password changes and super-administrator bootstrap.
//! Every credential, super-administrators included, is stored as a bcrypt hash.

use chrono::{Datelike, Local, NaiveDate};
use log::{info, warn};
use sqlx::PgPool;
use thiserror::Error;
use validator::Validate;

use crate::models::auth::{
    AccountCredentials, AccountStatus, ChangePasswordRequest, LoginRequest, LoginResponse, Role,
};
use crate::utils::{
    error::{violated_constraint, AppError},
    security::{hash_password_with_cost, verify_password, DEFAULT_BCRYPT_COST},
    validation::{normalize_email, validate_password_strength},
};

#[derive(Error, Debug)]
pub enum AuthServiceError {
    #[error("Login must go through a role-specific route")]
    RoleRouteRequired,

    #[error("User not found")]
    UserNotFound,

    #[error("Access denied for this role")]
    AccessDenied,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Profile not found for this account")]
    ProfileNotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Password hashing error: {0}")]
    HashingError(#[from] bcrypt::BcryptError),
}

impl From<AuthServiceError> for AppError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::RoleRouteRequired => AppError::BadRequest(
                "Use /auth/login/admin, /auth/login/docente, /auth/login/alumno or /auth/login/aplicativo"
                    .to_string(),
            ),
            AuthServiceError::UserNotFound => AppError::NotFound("Usuario no encontrado".to_string()),
            AuthServiceError::AccessDenied => {
                AppError::Forbidden("Acceso denegado para este rol".to_string())
            }
            AuthServiceError::InvalidCredentials => {
                AppError::Authentication("Credenciales inválidas".to_string())
            }
            AuthServiceError::AccountInactive => {
                AppError::Authentication("La cuenta está inactiva".to_string())
            }
            AuthServiceError::ProfileNotFound => {
                AppError::NotFound("Perfil no encontrado para esta cuenta".to_string())
            }
            AuthServiceError::EmailAlreadyExists => {
                AppError::Conflict("El correo ya está registrado".to_string())
            }
            AuthServiceError::ValidationError(msg) => AppError::Validation(msg),
            AuthServiceError::DatabaseError(e) => AppError::Database(e),
            AuthServiceError::HashingError(e) => AppError::HashingError(e),
        }
    }
}

pub type AuthServiceResult<T> = Result<T, AuthServiceError>;

/// Academic period label for a date: January-June is `I`, July-December `II`
pub fn academic_period(date: NaiveDate) -> String {
    let half = if date.month() <= 6 { "I" } else { "II" };
    format!("{}-{}", date.year(), half)
}

#[derive(Clone)]
pub struct AuthService {
    db_pool: PgPool,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(db_pool: PgPool) -> Self {
        Self {
            db_pool,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    pub fn with_bcrypt_cost(db_pool: PgPool, bcrypt_cost: u32) -> Self {
        Self {
            db_pool,
            bcrypt_cost,
        }
    }

    /// Authenticate against the role implied by the login route.
    ///
    /// The role check runs before the password check, so a valid account
    /// with the wrong role is always denied regardless of the password.
    pub async fn login(
        &self,
        route: &str,
        request: LoginRequest,
    ) -> AuthServiceResult<LoginResponse> {
        let expected_role =
            Role::from_login_route(route).ok_or(AuthServiceError::RoleRouteRequired)?;

        request
            .validate()
            .map_err(|e| AuthServiceError::ValidationError(format!("Invalid login data: {}", e)))?;

        let email = normalize_email(&request.email);

        let account = sqlx::query_as::<_, AccountCredentials>(
            "SELECT id, password_hash, status FROM users WHERE email = $1",
        )
        .bind(&email)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AuthServiceError::UserNotFound)?;

        let roles: Vec<Role> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1")
                .bind(account.id)
                .fetch_all(&self.db_pool)
                .await?;

        if !roles.contains(&expected_role) {
            warn!(
                "Login for {} denied: account does not hold role {}",
                email, expected_role
            );
            return Err(AuthServiceError::AccessDenied);
        }

        if !verify_password(&request.password, &account.password_hash)? {
            return Err(AuthServiceError::InvalidCredentials);
        }

        if account.status == AccountStatus::Inactive {
            return Err(AuthServiceError::AccountInactive);
        }

        let mut response = LoginResponse {
            user_id: account.id,
            role: expected_role,
            student_id: None,
            teacher_id: None,
            period: None,
        };

        match expected_role {
            Role::Alumno => {
                let student_id: i32 = sqlx::query_scalar(
                    r#"
                    SELECT s.id FROM students s
                    JOIN persons p ON p.id = s.person_id
                    WHERE p.user_id = $1
                    "#,
                )
                .bind(account.id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or(AuthServiceError::ProfileNotFound)?;

                response.student_id = Some(student_id);
                response.period = Some(academic_period(Local::now().date_naive()));
            }
            Role::Docente => {
                let teacher_id: i32 = sqlx::query_scalar(
                    r#"
                    SELECT t.id FROM teachers t
                    JOIN persons p ON p.id = t.person_id
                    WHERE p.user_id = $1
                    "#,
                )
                .bind(account.id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or(AuthServiceError::ProfileNotFound)?;

                response.teacher_id = Some(teacher_id);
            }
            Role::Admin | Role::SuperAdmin => {}
        }

        info!("User {} logged in as {}", account.id, expected_role);
        Ok(response)
    }

    /// Change a password after verifying the current one
    pub async fn change_password(
        &self,
        user_id: i32,
        request: ChangePasswordRequest,
    ) -> AuthServiceResult<()> {
        request.validate().map_err(|e| {
            AuthServiceError::ValidationError(format!("Invalid password data: {}", e))
        })?;

        let current_hash: String =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or(AuthServiceError::UserNotFound)?;

        if !verify_password(&request.current_password, &current_hash)? {
            return Err(AuthServiceError::InvalidCredentials);
        }

        let new_hash = hash_password_with_cost(&request.new_password, self.bcrypt_cost)?;

        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(&new_hash)
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;

        info!("Password changed for user {}", user_id);
        Ok(())
    }

    /// Create a super-administrator account
    pub async fn create_super_admin(&self, email: &str, password: &str) -> AuthServiceResult<i32> {
        if !validate_password_strength(password) {
            return Err(AuthServiceError::ValidationError(
                "Password must have 8+ characters with upper, lower case and a digit".to_string(),
            ));
        }

        let email = normalize_email(email);
        let password_hash = hash_password_with_cost(password, self.bcrypt_cost)?;

        let mut tx = self.db_pool.begin().await?;

        let user_id: i32 = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id",
        )
        .bind(&email)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if violated_constraint(&e) == Some("users_email_key") {
                AuthServiceError::EmailAlreadyExists
            } else {
                AuthServiceError::DatabaseError(e)
            }
        })?;

        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user_id)
            .bind(Role::SuperAdmin)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Super administrator {} created", email);
        Ok(user_id)
    }

    /// Overwrite the password of an account identified by email
    pub async fn reset_password(&self, email: &str, new_password: &str) -> AuthServiceResult<()> {
        let password_hash = hash_password_with_cost(new_password, self.bcrypt_cost)?;

        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE email = $2")
                .bind(&password_hash)
                .bind(normalize_email(email))
                .execute(&self.db_pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AuthServiceError::UserNotFound);
        }

        Ok(())
    }

    /// Database connectivity check
    pub async fn health_check(&self) -> AuthServiceResult<()> {
        crate::database::ping(&self.db_pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fixtures;

    #[test]
    fn test_academic_period_halves() {
        let date = |m| NaiveDate::from_ymd_opt(2026, m, 15).unwrap();
        assert_eq!(academic_period(date(1)), "2026-I");
        assert_eq!(academic_period(date(6)), "2026-I");
        assert_eq!(academic_period(date(7)), "2026-II");
        assert_eq!(academic_period(date(12)), "2026-II");
    }

    #[test]
    fn test_error_mapping() {
        let status = |e: AuthServiceError| AppError::from(e).status_code().as_u16();
        assert_eq!(status(AuthServiceError::UserNotFound), 404);
        assert_eq!(status(AuthServiceError::AccessDenied), 403);
        assert_eq!(status(AuthServiceError::InvalidCredentials), 401);
        assert_eq!(status(AuthServiceError::RoleRouteRequired), 400);
        assert_eq!(status(AuthServiceError::ProfileNotFound), 404);
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[sqlx::test]
    async fn test_wrong_role_is_denied_before_password_check(pool: PgPool) {
        fixtures::insert_teacher(&pool, "12345678").await;
        let service = AuthService::with_bcrypt_cost(pool, 4);
        let email = "docente12345678@unfv.edu.pe";

        for password in [fixtures::TEST_PASSWORD, "Incorrecta1"] {
            let result = service.login("alumno", login_request(email, password)).await;
            assert!(
                matches!(result, Err(AuthServiceError::AccessDenied)),
                "password {password}: {result:?}"
            );
        }

        let response = service
            .login("docente", login_request(email, fixtures::TEST_PASSWORD))
            .await
            .unwrap();
        assert_eq!(response.role, Role::Docente);
        assert!(response.teacher_id.is_some());
        assert!(response.student_id.is_none());

        let wrong = service
            .login("docente", login_request(email, "Incorrecta1"))
            .await;
        assert!(matches!(wrong, Err(AuthServiceError::InvalidCredentials)));
    }

    #[sqlx::test]
    async fn test_unknown_account(pool: PgPool) {
        let service = AuthService::with_bcrypt_cost(pool, 4);
        let result = service
            .login("admin", login_request("nadie@unfv.edu.pe", "Clave2025"))
            .await;
        assert!(matches!(result, Err(AuthServiceError::UserNotFound)));
    }
}
