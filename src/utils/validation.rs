//! Validation Utilities
//!
//! Field validators shared by request DTOs and services. Everything here is
//! pure and runs before any database mutation.

use chrono::NaiveTime;
use regex::Regex;
use std::sync::OnceLock;
use validator::ValidationError;

/// Institutional mail domain for teachers
pub const TEACHER_EMAIL_DOMAIN: &str = "@docenteunfv.edu.pe";

/// Institutional mail domain for students
pub const STUDENT_EMAIL_DOMAIN: &str = "@alumnounfv.edu.pe";

/// Institutional mail domain for administrative staff
pub const STAFF_EMAIL_DOMAIN: &str = "@unfv.edu.pe";

/// True iff `phone` is exactly nine ASCII digits
pub fn valid_phone(phone: &str) -> bool {
    phone.len() == 9 && phone.bytes().all(|b| b.is_ascii_digit())
}

/// True iff `dni` is exactly eight ASCII digits
pub fn valid_national_id(dni: &str) -> bool {
    dni.len() == 8 && dni.bytes().all(|b| b.is_ascii_digit())
}

/// Mail domain registered for a role name, if any
pub fn institutional_domain(role: &str) -> Option<&'static str> {
    match role {
        "Docente" => Some(TEACHER_EMAIL_DOMAIN),
        "Alumno" => Some(STUDENT_EMAIL_DOMAIN),
        _ => None,
    }
}

/// True iff `email` ends with the domain registered for `role`.
///
/// Roles without a registered domain always fail.
pub fn valid_institutional_email(email: &str, role: &str) -> bool {
    match institutional_domain(role) {
        Some(domain) => email.len() > domain.len() && email.ends_with(domain),
        None => false,
    }
}

/// Validates email address format
pub fn validate_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    regex.is_match(email)
}

/// Normalizes email address to lowercase and removes whitespace
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates a personal name: letters (accented included), spaces, hyphens, apostrophes
pub fn validate_name(name: &str) -> bool {
    let trimmed = name.trim();

    if trimmed.is_empty() || trimmed.chars().count() > 120 {
        return false;
    }

    static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = NAME_REGEX
        .get_or_init(|| Regex::new(r"^[\p{L}\s\-'.]+$").expect("Failed to compile name regex"));

    regex.is_match(trimmed)
}

/// Course code format.
///
/// Electives look like `EL001IV` (three digits plus a roman cycle up to X);
/// every other course type uses a purely numeric code.
pub fn valid_course_code(code: &str, course_type: &str) -> bool {
    static ELECTIVE_REGEX: OnceLock<Regex> = OnceLock::new();

    if course_type.eq_ignore_ascii_case("electivo") {
        let regex = ELECTIVE_REGEX.get_or_init(|| {
            Regex::new(r"^EL\d{3}(I|II|III|IV|V|VI|VII|VIII|IX|X)$")
                .expect("Failed to compile elective code regex")
        });
        regex.is_match(code)
    } else {
        !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())
    }
}

/// Password rule for self-service changes: 8+ chars with upper, lower and digit
pub fn validate_password_strength(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Parses a wall-clock time in `HH:MM` form
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Custom validator for phone fields
pub fn phone_validator(phone: &str) -> Result<(), ValidationError> {
    if valid_phone(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_phone").with_message(messages::INVALID_PHONE.into()))
    }
}

/// Custom validator for DNI fields
pub fn dni_validator(dni: &str) -> Result<(), ValidationError> {
    if valid_national_id(dni) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_dni").with_message(messages::INVALID_DNI.into()))
    }
}

/// Custom validator for free-form email fields
pub fn email_validator(email: &str) -> Result<(), ValidationError> {
    if validate_email(email) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email").with_message(messages::INVALID_EMAIL.into()))
    }
}

/// Custom validator for student institutional email fields
pub fn student_email_validator(email: &str) -> Result<(), ValidationError> {
    if validate_email(email) && valid_institutional_email(email, "Alumno") {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_student_email")
            .with_message(messages::INVALID_STUDENT_EMAIL.into()))
    }
}

/// Custom validator for teacher institutional email fields
pub fn teacher_email_validator(email: &str) -> Result<(), ValidationError> {
    if validate_email(email) && valid_institutional_email(email, "Docente") {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_teacher_email")
            .with_message(messages::INVALID_TEACHER_EMAIL.into()))
    }
}

/// Custom validator for name fields
pub fn name_validator(name: &str) -> Result<(), ValidationError> {
    if validate_name(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_name").with_message(messages::INVALID_NAME.into()))
    }
}

/// Custom validator for password strength
pub fn password_strength_validator(password: &str) -> Result<(), ValidationError> {
    if validate_password_strength(password) {
        Ok(())
    } else {
        Err(ValidationError::new("weak_password").with_message(messages::WEAK_PASSWORD.into()))
    }
}

/// Validation error messages for user-friendly responses
pub mod messages {
    pub const INVALID_PHONE: &str = "El teléfono debe tener exactamente 9 dígitos";
    pub const INVALID_DNI: &str = "El DNI debe tener exactamente 8 dígitos";
    pub const INVALID_EMAIL: &str = "Ingrese un correo electrónico válido";
    pub const INVALID_STUDENT_EMAIL: &str = "El correo debe terminar en @alumnounfv.edu.pe";
    pub const INVALID_TEACHER_EMAIL: &str = "El correo debe terminar en @docenteunfv.edu.pe";
    pub const INVALID_NAME: &str = "El nombre solo puede contener letras, espacios y guiones";
    pub const WEAK_PASSWORD: &str =
        "La contraseña debe tener al menos 8 caracteres, una mayúscula, una minúscula y un número";
    pub const INVALID_COURSE_CODE: &str =
        "Código inválido: los electivos usan ELnnn + ciclo romano, los demás solo dígitos";
    pub const INVALID_TIME: &str = "Las horas deben tener el formato HH:MM";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_phone() {
        assert!(valid_phone("987654321"));
        assert!(valid_phone("000000000"));
        assert!(!valid_phone("98765432"));
        assert!(!valid_phone("9876543210"));
        assert!(!valid_phone("98765432a"));
        assert!(!valid_phone(" 98765432"));
        assert!(!valid_phone(""));
    }

    #[test]
    fn test_valid_phone_rejects_non_ascii_digits() {
        // Arabic-Indic digits are numeric but not ASCII
        assert!(!valid_phone("٩٨٧٦٥٤٣٢١"));
    }

    #[test]
    fn test_valid_national_id() {
        assert!(valid_national_id("12345678"));
        assert!(!valid_national_id("1234567"));
        assert!(!valid_national_id("123456789"));
        assert!(!valid_national_id("1234567x"));
        assert!(!valid_national_id(""));
    }

    #[test]
    fn test_every_nine_digit_string_is_a_phone() {
        for seed in [0u64, 1, 42, 123_456_789, 999_999_999] {
            let phone = format!("{:09}", seed);
            assert!(valid_phone(&phone), "{} should be valid", phone);
            assert!(!valid_national_id(&phone));
        }
    }

    #[test]
    fn test_institutional_email_gating() {
        assert!(valid_institutional_email("x@docenteunfv.edu.pe", "Docente"));
        assert!(!valid_institutional_email("x@docenteunfv.edu.pe", "Alumno"));
        assert!(valid_institutional_email("2021001@alumnounfv.edu.pe", "Alumno"));
        assert!(!valid_institutional_email("x@gmail.com", "Docente"));
    }

    #[test]
    fn test_unknown_role_fails_closed() {
        assert!(!valid_institutional_email("x@docenteunfv.edu.pe", "Admin"));
        assert!(!valid_institutional_email("x@unfv.edu.pe", ""));
        assert!(!valid_institutional_email("x@docenteunfv.edu.pe", "docente"));
    }

    #[test]
    fn test_domain_alone_is_not_an_address() {
        assert!(!valid_institutional_email("@alumnounfv.edu.pe", "Alumno"));
    }

    #[test]
    fn test_validate_name_accepts_spanish_names() {
        assert!(validate_name("María José"));
        assert!(validate_name("Núñez-Peña"));
        assert!(!validate_name(""));
        assert!(!validate_name("Juan123"));
    }

    #[test]
    fn test_course_codes() {
        assert!(valid_course_code("EL001IV", "Electivo"));
        assert!(valid_course_code("EL123X", "electivo"));
        assert!(!valid_course_code("EL12IV", "Electivo"));
        assert!(!valid_course_code("EL001XI", "Electivo"));
        assert!(!valid_course_code("1001", "Electivo"));

        assert!(valid_course_code("1001", "Obligatorio"));
        assert!(!valid_course_code("EL001IV", "Obligatorio"));
        assert!(!valid_course_code("", "Obligatorio"));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Segura123"));
        assert!(!validate_password_strength("segura123"));
        assert!(!validate_password_strength("SEGURA123"));
        assert!(!validate_password_strength("SeguraXYZ"));
        assert!(!validate_password_strength("Sg1"));
    }

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(
            parse_clock_time("08:30"),
            NaiveTime::from_hms_opt(8, 30, 0)
        );
        assert!(parse_clock_time("8h30").is_none());
        assert!(parse_clock_time("25:00").is_none());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Juan.Perez@DocenteUNFV.edu.pe "),
            "juan.perez@docenteunfv.edu.pe"
        );
    }

    #[test]
    fn test_custom_validators_carry_messages() {
        let err = dni_validator("12").unwrap_err();
        assert_eq!(err.code, "invalid_dni");
        assert!(err.message.is_some());
        assert!(phone_validator("987654321").is_ok());
        assert!(student_email_validator("a@docenteunfv.edu.pe").is_err());
    }
}
