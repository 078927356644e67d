//! Database repository for the append-only login audit log.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::audit_log::{AuditEntryCreateDBRequest, LoginAuditEntry},
};

pub struct AuditLog<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> AuditLog<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Append one audit record. Callers append before the corresponding
    /// response is returned, for every outcome including lockouts.
    #[instrument(skip(self, request), fields(email = %request.email, success = request.success), err)]
    pub async fn append(&mut self, request: &AuditEntryCreateDBRequest) -> Result<()> {
        sqlx::query(
            "INSERT INTO login_audit_log (email, ip, user_agent, timestamp, success, message)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.email)
        .bind(&request.ip)
        .bind(&request.user_agent)
        .bind(Utc::now())
        .bind(request.success)
        .bind(&request.message)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Most recent entries first.
    #[instrument(skip(self), err)]
    pub async fn list(&mut self, limit: i64) -> Result<Vec<LoginAuditEntry>> {
        let entries = sqlx::query_as::<_, LoginAuditEntry>(
            "SELECT id, email, ip, user_agent, timestamp, success, message
             FROM login_audit_log ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(entries)
    }
}
