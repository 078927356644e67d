use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::time::Duration;
use utoipa::ToSchema;

/// A server-held session row. The id is opaque and unguessable; deleting the
/// row immediately invalidates every bearer token bound to it, regardless of
/// the token's own expiry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Session {
    pub id: String,
    pub email: String,
    pub ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Request to create a session after a completed two-factor login.
#[derive(Debug, Clone)]
pub struct SessionCreateDBRequest {
    pub email: String,
    pub ip: String,
    pub user_agent: String,
    pub ttl: Duration,
}
