//! Configuration Module
//!
//! Centralized configuration for the academic service: server, database,
//! mail, uploads and security settings, all read from the environment.

pub mod security;

use std::path::PathBuf;

pub use crate::database::DatabaseConfig;
pub use crate::service::email_service::EmailConfig;
pub use security::{Profile, SecurityConfig, SecurityConfigError};

/// Environment variable helpers
pub mod env {
    use std::env;

    /// Get environment variable as string with default
    pub fn get_string(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get environment variable as optional non-empty string
    pub fn get_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Get environment variable as u32 with default
    pub fn get_u32(key: &str, default: u32) -> u32 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u16 with default
    pub fn get_u16(key: &str, default: u16) -> u16 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u64 with default
    pub fn get_u64(key: &str, default: u64) -> u64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as usize with default
    pub fn get_usize(key: &str, default: usize) -> usize {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Check if environment variable is set
    pub fn is_set(key: &str) -> bool {
        env::var(key).is_ok()
    }
}

/// Default upload ceiling for teaching material: 25 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application configuration combining all service configurations
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Security configuration
    pub security: SecurityConfig,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Email configuration; `None` disables credential mails
    pub email: Option<EmailConfig>,

    /// Teaching material storage
    pub uploads: UploadConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Where uploaded material lives and how large it may be
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env::get_string("SERVER_HOST", "0.0.0.0"),
            port: env::get_u16("SERVER_PORT", 5000),
            cors_origins: env::get_string("CORS_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(env::get_string("UPLOAD_DIR", "uploads/materiales")),
            max_bytes: env::get_usize("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

impl AppConfig {
    /// Load complete application configuration from environment
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            security: SecurityConfig::from_env()?,
            server: ServerConfig::default(),
            database: DatabaseConfig::from_env()?,
            email: EmailConfig::from_env_optional()?,
            uploads: UploadConfig::default(),
        })
    }

    /// Validate the complete configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.security.validate()?;

        if self.server.port == 0 {
            return Err("Server port must be greater than 0".into());
        }

        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".into());
        }

        if self.database.min_connections > self.database.max_connections {
            return Err("Database min_connections cannot be greater than max_connections".into());
        }

        if self.uploads.max_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be greater than 0".into());
        }

        Ok(())
    }

    /// Whether the server accepts requests from any origin
    pub fn allows_any_origin(&self) -> bool {
        self.server.cors_origins.is_empty() || self.server.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> AppConfig {
        AppConfig {
            security: SecurityConfig::default(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig::default(),
            email: None,
            uploads: UploadConfig {
                dir: PathBuf::from("/tmp/materiales"),
                max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
        }
    }

    #[test]
    fn test_valid_config() {
        let config = test_config();
        assert!(config.validate().is_ok());
        assert!(config.allows_any_origin());
        assert_eq!(config.database.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_pool_bounds() {
        let mut config = test_config();
        config.database.min_connections = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_upload_limit_rejected() {
        let mut config = test_config();
        config.uploads.max_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_origins() {
        let mut config = test_config();
        config.server.cors_origins = vec!["http://localhost:5173".to_string()];
        assert!(!config.allows_any_origin());
    }

    #[test]
    fn test_env_helpers() {
        assert_eq!(env::get_u32("ACADEMIC_NONEXISTENT_U32", 42), 42);
        assert_eq!(env::get_string("ACADEMIC_NONEXISTENT_STRING", "x"), "x");
        assert!(env::get_optional("ACADEMIC_NONEXISTENT_STRING").is_none());
        assert!(!env::is_set("ACADEMIC_NONEXISTENT_STRING"));
    }
}
