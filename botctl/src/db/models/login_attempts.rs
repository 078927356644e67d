use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Failure counter for one (ip, email) pair.
///
/// Invariants: `attempts` starts at 1 on the first failure and is never 0;
/// `locked_at` is set iff `locked`; a lock self-expires once the configured
/// lock duration has elapsed since `locked_at`.
#[derive(Debug, Clone, FromRow)]
pub struct LoginAttempt {
    pub ip: String,
    pub email: String,
    pub attempts: i64,
    pub last_attempt: DateTime<Utc>,
    pub locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
}
