//! Teacher audit trail
//!
//! Append-only log of the changes teachers make to academic records. Entries
//! are written on the caller's connection so they commit or roll back with
//! the mutation they describe.

use serde_json::Value;
use sqlx::{PgConnection, PgPool};

use crate::models::AuditEntry;

/// Kind of change being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Insert => "INSERT",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

/// Append an audit entry on an open connection or transaction
pub async fn record(
    conn: &mut PgConnection,
    teacher_id: i32,
    action: AuditAction,
    table_name: &str,
    record_id: Option<i32>,
    details: Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO teacher_audit_log (teacher_id, action, table_name, record_id, details)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(teacher_id)
    .bind(action.as_str())
    .bind(table_name)
    .bind(record_id)
    .bind(details)
    .execute(conn)
    .await?;

    Ok(())
}

/// Most recent entries for a teacher, newest first
pub async fn recent_for_teacher(
    pool: &PgPool,
    teacher_id: i32,
    limit: i64,
) -> Result<Vec<AuditEntry>, sqlx::Error> {
    sqlx::query_as::<_, AuditEntry>(
        r#"
        SELECT id, teacher_id, action, table_name, record_id, details, created_at
        FROM teacher_audit_log
        WHERE teacher_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(teacher_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_labels() {
        assert_eq!(AuditAction::Insert.as_str(), "INSERT");
        assert_eq!(AuditAction::Update.as_str(), "UPDATE");
        assert_eq!(AuditAction::Delete.as_str(), "DELETE");
    }
}
