//! Database Connection Management
//!
//! Pool configuration for PostgreSQL. Handlers never keep a connection past
//! the request: services check one out per operation and, for writes, wrap
//! it in a transaction that rolls back when dropped uncommitted.

use sqlx::PgPool;
use std::time::Duration;

use crate::config::env;

/// Database connection pool type alias for convenience
pub type DatabasePool = PgPool;

/// Database configuration for connection setup
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/academic".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(3600),
        }
    }
}

impl DatabaseConfig {
    /// Create database configuration from environment variables.
    ///
    /// `DATABASE_URL` wins; otherwise the URL is assembled from the
    /// `DB_HOST`/`DB_PORT`/`DB_NAME`/`DB_USER`/`DB_PASS` parts.
    pub fn from_env() -> anyhow::Result<Self> {
        let url = match env::get_optional("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = env::get_optional("DB_HOST").ok_or_else(|| {
                    anyhow::anyhow!("DATABASE_URL or DB_HOST environment variable is required")
                })?;
                let name = env::get_optional("DB_NAME")
                    .ok_or_else(|| anyhow::anyhow!("DB_NAME environment variable is required"))?;
                let user = env::get_optional("DB_USER")
                    .ok_or_else(|| anyhow::anyhow!("DB_USER environment variable is required"))?;
                let password = env::get_string("DB_PASS", "");
                let port = env::get_u16("DB_PORT", 5432);
                build_url(&host, port, &name, &user, &password)
            }
        };

        Ok(Self {
            url,
            max_connections: env::get_u32("DB_MAX_CONNECTIONS", 10),
            min_connections: env::get_u32("DB_MIN_CONNECTIONS", 1),
            connect_timeout: Duration::from_secs(env::get_u64("DB_CONNECT_TIMEOUT", 5)),
            idle_timeout: Duration::from_secs(env::get_u64("DB_IDLE_TIMEOUT", 600)),
            max_lifetime: Duration::from_secs(env::get_u64("DB_MAX_LIFETIME", 3600)),
        })
    }

    /// Create a database connection pool from this configuration
    pub async fn create_pool(&self) -> Result<PgPool, sqlx::Error> {
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
            .connect(&self.url)
            .await
    }
}

fn build_url(host: &str, port: u16, name: &str, user: &str, password: &str) -> String {
    if password.is_empty() {
        format!("postgresql://{}@{}:{}/{}", user, host, port, name)
    } else {
        format!("postgresql://{}:{}@{}:{}/{}", user, password, host, port, name)
    }
}

/// Round-trips a trivial query to prove the pool can reach the server
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_build_url_from_parts() {
        assert_eq!(
            build_url("db", 5432, "academic", "app", "secret"),
            "postgresql://app:secret@db:5432/academic"
        );
        assert_eq!(
            build_url("localhost", 5433, "academic", "app", ""),
            "postgresql://app@localhost:5433/academic"
        );
    }
}
