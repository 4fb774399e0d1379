//! Security Configuration
//!
//! Deployment profile, application secret and password hashing cost.

use std::env;
use std::fmt;

use thiserror::Error;

use crate::utils::security::DEFAULT_BCRYPT_COST;

/// Security configuration errors
#[derive(Error, Debug)]
pub enum SecurityConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {value} - {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Deployment profile selected through `APP_PROFILE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Development,
    Production,
}

impl Profile {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Profile::Development),
            "production" | "prod" => Some(Profile::Production),
            _ => None,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Development => write!(f, "development"),
            Profile::Production => write!(f, "production"),
        }
    }
}

/// Security-related settings
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Active deployment profile
    pub profile: Profile,

    /// Application secret; mandatory in production
    pub secret_key: Option<String>,

    /// bcrypt cost applied to every stored credential
    pub bcrypt_cost: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Development,
            secret_key: None,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl SecurityConfig {
    /// Load security configuration from environment variables
    pub fn from_env() -> Result<Self, SecurityConfigError> {
        let mut config = Self::default();

        if let Ok(profile) = env::var("APP_PROFILE") {
            config.profile =
                Profile::parse(&profile).ok_or_else(|| SecurityConfigError::InvalidValue {
                    key: "APP_PROFILE".to_string(),
                    value: profile.clone(),
                    reason: "Must be 'development' or 'production'".to_string(),
                })?;
        }

        config.secret_key = env::var("SECRET_KEY").ok().filter(|s| !s.is_empty());

        if let Ok(cost) = env::var("BCRYPT_COST") {
            config.bcrypt_cost = cost.parse().map_err(|_| SecurityConfigError::InvalidValue {
                key: "BCRYPT_COST".to_string(),
                value: cost.clone(),
                reason: "Must be an integer".to_string(),
            })?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate security configuration
    pub fn validate(&self) -> Result<(), SecurityConfigError> {
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(SecurityConfigError::ValidationError(
                "bcrypt cost must be between 4 and 31".to_string(),
            ));
        }

        if self.profile == Profile::Production && self.secret_key.is_none() {
            return Err(SecurityConfigError::MissingEnvVar("SECRET_KEY".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_security_config() {
        let config = SecurityConfig::default();
        assert_eq!(config.profile, Profile::Development);
        assert_eq!(config.bcrypt_cost, DEFAULT_BCRYPT_COST);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_secret() {
        let mut config = SecurityConfig {
            profile: Profile::Production,
            ..SecurityConfig::default()
        };
        assert!(config.validate().is_err());

        config.secret_key = Some("s3cr3t".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_bcrypt_cost() {
        let config = SecurityConfig {
            bcrypt_cost: 2,
            ..SecurityConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!(Profile::parse("Production"), Some(Profile::Production));
        assert_eq!(Profile::parse("dev"), Some(Profile::Development));
        assert_eq!(Profile::parse("staging"), None);
    }
}
