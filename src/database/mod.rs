//! Database Module
//!
//! Connection pool configuration for the academic service.

pub mod connection;

// Re-export commonly used types
pub use connection::{ping, DatabaseConfig, DatabasePool};
