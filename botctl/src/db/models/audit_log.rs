use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// One append-only audit record per authentication attempt, successful or
/// not. The message records the precise internal cause; responses to the
/// client stay generic.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoginAuditEntry {
    pub id: i64,
    pub email: String,
    pub ip: String,
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub message: String,
}

/// Request to append an audit record.
#[derive(Debug, Clone)]
pub struct AuditEntryCreateDBRequest {
    pub email: String,
    pub ip: String,
    pub user_agent: String,
    pub success: bool,
    pub message: String,
}
