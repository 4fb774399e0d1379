//! Security Utilities
//!
//! Password hashing and generation of provisional credentials.

use bcrypt::{hash, verify, DEFAULT_COST};
use rand::Rng;

use super::validation::STAFF_EMAIL_DOMAIN;

/// Default bcrypt cost for password hashing
pub const DEFAULT_BCRYPT_COST: u32 = DEFAULT_COST;

/// Length of generated administrator passwords
pub const GENERATED_PASSWORD_LENGTH: usize = 10;

const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";

/// Hash a password with custom bcrypt cost
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

/// Random password drawn from letters, digits and `!@#$%^&*`
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}

/// Provisional password given to new students: the last four digits of the DNI
pub fn temporary_password_from_dni(dni: &str) -> String {
    let digits: Vec<char> = dni.trim().chars().collect();
    digits[digits.len().saturating_sub(4)..].iter().collect()
}

/// Replaces Spanish accented letters with their ASCII base letter
pub fn strip_accents(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'Á' | 'À' | 'Ä' | 'Â' => 'A',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Local part of a staff address: first-name initial, first surname, second-surname initial.
///
/// `first_names` and `last_names` are the space-separated name fields as entered.
pub fn staff_email_local_part(first_names: &str, last_names: &str) -> String {
    let first_names = strip_accents(first_names.trim()).to_lowercase();
    let last_names = strip_accents(last_names.trim()).to_lowercase();

    let mut names = first_names.split_whitespace();
    let mut surnames = last_names.split_whitespace();

    let mut local = String::new();
    if let Some(initial) = names.next().and_then(|n| n.chars().next()) {
        local.push(initial);
    }
    if let Some(surname) = surnames.next() {
        local.push_str(surname);
    }
    if let Some(initial) = surnames.next().and_then(|s| s.chars().next()) {
        local.push(initial);
    }

    local.retain(|c| c.is_ascii_alphanumeric());
    local
}

/// Full staff address, with an optional numeric suffix used to resolve collisions
pub fn generate_staff_email(first_names: &str, last_names: &str, suffix: Option<u32>) -> String {
    let local = staff_email_local_part(first_names, last_names);
    match suffix {
        Some(n) => format!("{}{}{}", local, n, STAFF_EMAIL_DOMAIN),
        None => format!("{}{}", local, STAFF_EMAIL_DOMAIN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let password = "clave_segura_123";
        let hash = hash_password_with_cost(password, 4).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("otra_clave", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password_with_cost("5678", 4).unwrap();
        let b = hash_password_with_cost("5678", 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_password_charset() {
        let password = generate_password(GENERATED_PASSWORD_LENGTH);
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(password.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
        assert_ne!(password, generate_password(GENERATED_PASSWORD_LENGTH));
    }

    #[test]
    fn test_temporary_password_from_dni() {
        assert_eq!(temporary_password_from_dni("12345678"), "5678");
        assert_eq!(temporary_password_from_dni("123"), "123");
    }

    #[test]
    fn test_staff_email_generation() {
        assert_eq!(
            generate_staff_email("Juan Carlos", "Pérez Gómez", None),
            "jperezg@unfv.edu.pe"
        );
        assert_eq!(
            generate_staff_email("Ñusta", "Quispe", None),
            "nquispe@unfv.edu.pe"
        );
        assert_eq!(
            generate_staff_email("Ana", "Núñez Díaz", Some(2)),
            "anunezd2@unfv.edu.pe"
        );
    }

    #[test]
    fn test_strip_accents() {
        assert_eq!(strip_accents("Miércoles Sábado"), "Miercoles Sabado");
    }
}
