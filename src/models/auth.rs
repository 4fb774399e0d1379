//! Authentication Models
//!
//! Roles, account status and login payloads.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::common::RecordStatus;
use crate::utils::validation::password_strength_validator;

/// Fixed set of roles an account can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    Docente,
    Alumno,
}

impl Role {
    /// Role implied by the last segment of a `/auth/login/{route}` path
    pub fn from_login_route(route: &str) -> Option<Self> {
        match route {
            "aplicativo" => Some(Role::SuperAdmin),
            "admin" => Some(Role::Admin),
            "docente" => Some(Role::Docente),
            "alumno" => Some(Role::Alumno),
            _ => None,
        }
    }

    /// Human label used in mails and messages
    pub fn label(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::Docente => "Docente",
            Role::Alumno => "Alumno",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether an account may log in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
}

/// Administrator profiles carry a record status that mirrors the account
impl From<RecordStatus> for AccountStatus {
    fn from(status: RecordStatus) -> Self {
        match status {
            RecordStatus::Active => AccountStatus::Active,
            RecordStatus::Inactive => AccountStatus::Inactive,
        }
    }
}

/// Credentials posted to a role-specific login route
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(alias = "correo")]
    #[validate(length(min = 1, message = "El correo es obligatorio"))]
    pub email: String,

    #[serde(alias = "contrasena")]
    #[validate(length(min = 1, message = "La contraseña es obligatoria"))]
    pub password: String,
}

/// Successful login outcome
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i32,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<i32>,
    /// Academic period label such as `2026-II`, only for students
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

/// Account row used during login
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AccountCredentials {
    pub id: i32,
    pub password_hash: String,
    pub status: AccountStatus,
}

/// Self-service password change
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "La contraseña actual es obligatoria"))]
    pub current_password: String,

    #[validate(custom(function = "password_strength_validator"))]
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_status_maps_to_account_status() {
        assert_eq!(AccountStatus::from(RecordStatus::Active), AccountStatus::Active);
        assert_eq!(AccountStatus::from(RecordStatus::Inactive), AccountStatus::Inactive);
    }

    #[test]
    fn test_login_routes() {
        assert_eq!(Role::from_login_route("aplicativo"), Some(Role::SuperAdmin));
        assert_eq!(Role::from_login_route("alumno"), Some(Role::Alumno));
        assert_eq!(Role::from_login_route("superadmin"), None);
    }

    #[test]
    fn test_login_request_accepts_legacy_keys() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"correo": "a@alumnounfv.edu.pe", "contrasena": "5678"}"#)
                .unwrap();
        assert_eq!(request.email, "a@alumnounfv.edu.pe");
        assert_eq!(request.password, "5678");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_change_password_requires_strength() {
        let request = ChangePasswordRequest {
            current_password: "old".to_string(),
            new_password: "weak".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"SuperAdmin\"");
        assert_eq!(Role::Docente.to_string(), "Docente");
    }
}
