//! Shared Model Types
//!
//! Status enums reused by several entities and generic response payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Active/inactive flag used by courses, sections, time blocks, enrollments
/// and administrator profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "record_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    #[serde(alias = "ACTIVO", alias = "Activo", alias = "activo")]
    Active,
    #[serde(alias = "INACTIVO", alias = "Inactivo", alias = "inactivo")]
    Inactive,
}

impl Default for RecordStatus {
    fn default() -> Self {
        RecordStatus::Active
    }
}

/// Health check response payload
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Number of rows touched by a bulk operation
#[derive(Debug, Serialize)]
pub struct AffectedRows {
    pub affected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_status_accepts_spanish_labels() {
        let status: RecordStatus = serde_json::from_str("\"Inactivo\"").unwrap();
        assert_eq!(status, RecordStatus::Inactive);
        let status: RecordStatus = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(status, RecordStatus::Active);
        assert_eq!(serde_json::to_string(&RecordStatus::Active).unwrap(), "\"ACTIVE\"");
    }
}
