//! People Models
//!
//! Students, teachers and administrators. Each owns a person record that in
//! turn belongs to a login account.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{auth::AccountStatus, common::RecordStatus};
use crate::utils::validation::{
    dni_validator, email_validator, name_validator, phone_validator, student_email_validator,
    teacher_email_validator,
};

/// School a student is placed in when the request does not name one
pub const DEFAULT_SCHOOL_ID: i32 = 1;

// ---------------------------------------------------------------------------
// Students
// ---------------------------------------------------------------------------

/// Student as shown in the back office
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Student {
    pub student_id: i32,
    pub user_id: i32,
    pub university_code: String,
    pub institutional_email: String,
    pub personal_email: Option<String>,
    pub first_names: String,
    pub last_names: String,
    pub dni: String,
    pub phone: Option<String>,
    pub school_id: i32,
    pub school_name: String,
    pub admission_cycle: Option<String>,
    pub status: AccountStatus,
}

/// Payload for creating or fully updating a student
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StudentRequest {
    #[validate(custom(function = "student_email_validator"))]
    pub institutional_email: String,

    #[validate(custom(function = "email_validator"))]
    pub personal_email: Option<String>,

    #[validate(custom(function = "name_validator"))]
    pub first_names: String,

    #[validate(custom(function = "name_validator"))]
    pub paternal_surname: String,

    #[validate(custom(function = "name_validator"))]
    pub maternal_surname: String,

    #[validate(custom(function = "dni_validator"))]
    pub dni: String,

    #[validate(custom(function = "phone_validator"))]
    pub phone: String,

    #[validate(length(min = 1, max = 20, message = "El código universitario es obligatorio"))]
    pub university_code: String,

    #[validate(length(max = 10))]
    pub admission_cycle: Option<String>,

    pub school_id: Option<i32>,
}

impl StudentRequest {
    /// Surnames stored on the person record: paternal then maternal
    pub fn last_names(&self) -> String {
        format!(
            "{} {}",
            self.paternal_surname.trim(),
            self.maternal_surname.trim()
        )
    }

    pub fn school_id(&self) -> i32 {
        self.school_id.unwrap_or(DEFAULT_SCHOOL_ID)
    }
}

/// Result of provisioning a student account
#[derive(Debug, Serialize)]
pub struct CreateStudentResponse {
    pub user_id: i32,
    pub student_id: i32,
    pub university_code: String,
    pub institutional_email: String,
    pub email_sent: bool,
}

// ---------------------------------------------------------------------------
// Teachers
// ---------------------------------------------------------------------------

/// Teacher as shown in the back office and in the teacher's own profile
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Teacher {
    pub teacher_id: i32,
    pub user_id: i32,
    pub teacher_code: String,
    pub email: String,
    pub first_names: String,
    pub last_names: String,
    pub dni: String,
    pub phone: Option<String>,
    pub school_id: i32,
    pub school_name: String,
    pub address: Option<String>,
    pub district_id: Option<i32>,
    pub status: AccountStatus,
}

/// Payload for creating a teacher
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTeacherRequest {
    #[validate(custom(function = "teacher_email_validator"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "La contraseña debe tener al menos 8 caracteres"))]
    pub password: String,

    #[validate(custom(function = "name_validator"))]
    pub first_names: String,

    #[validate(custom(function = "name_validator"))]
    pub last_names: String,

    #[validate(custom(function = "dni_validator"))]
    pub dni: String,

    #[validate(custom(function = "phone_validator"))]
    pub phone: String,

    pub school_id: i32,

    #[validate(length(min = 1, max = 255))]
    pub address: Option<String>,

    pub district_id: Option<i32>,
}

/// Payload for updating a teacher from the back office
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateTeacherRequest {
    #[validate(custom(function = "name_validator"))]
    pub first_names: String,

    #[validate(custom(function = "name_validator"))]
    pub last_names: String,

    #[validate(custom(function = "phone_validator"))]
    pub phone: String,

    pub school_id: Option<i32>,

    /// New password; the current one is kept when absent
    #[validate(length(min = 8, max = 128, message = "La contraseña debe tener al menos 8 caracteres"))]
    pub password: Option<String>,
}

/// Result of provisioning a teacher account
#[derive(Debug, Serialize)]
pub struct CreateTeacherResponse {
    pub user_id: i32,
    pub teacher_id: i32,
    pub teacher_code: String,
    pub email: String,
    pub email_sent: bool,
}

/// Fields a teacher may change on their own profile
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(custom(function = "phone_validator"))]
    pub phone: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub address: Option<String>,

    pub district_id: Option<i32>,
}

// ---------------------------------------------------------------------------
// Administrators
// ---------------------------------------------------------------------------

/// Administrative staff member
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Administrator {
    pub admin_id: i32,
    pub user_id: i32,
    pub email: String,
    pub first_names: String,
    pub last_names: String,
    pub dni: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub address_detail: Option<String>,
    pub district_id: Option<i32>,
    pub formation_id: Option<i32>,
    pub specialty_id: Option<i32>,
    pub work_experience: Option<String>,
    pub school_id: Option<i32>,
    pub status: RecordStatus,
}

/// Payload for creating or updating an administrator
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminRequest {
    #[validate(custom(function = "name_validator"))]
    pub first_names: String,

    /// Both surnames separated by a space
    #[validate(custom(function = "name_validator"))]
    pub last_names: String,

    #[validate(custom(function = "dni_validator"))]
    pub dni: String,

    #[validate(custom(function = "phone_validator"))]
    pub phone: String,

    pub birth_date: Option<NaiveDate>,

    #[validate(length(max = 255))]
    pub address_detail: Option<String>,

    pub district_id: Option<i32>,
    pub formation_id: Option<i32>,
    pub specialty_id: Option<i32>,

    #[validate(length(max = 2000))]
    pub work_experience: Option<String>,

    pub school_id: Option<i32>,

    /// Where to deliver the credentials; defaults to the generated address
    #[validate(custom(function = "email_validator"))]
    pub personal_email: Option<String>,
}

/// Result of provisioning an administrator
#[derive(Debug, Serialize)]
pub struct CreateAdminResponse {
    pub admin_id: i32,
    pub user_id: i32,
    pub email: String,
    pub generated_password: String,
    pub email_sent: bool,
}

/// Enable or disable an administrator
#[derive(Debug, Clone, Deserialize)]
pub struct AdminStatusRequest {
    #[serde(alias = "estado")]
    pub status: RecordStatus,
}
