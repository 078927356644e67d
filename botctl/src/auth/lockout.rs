//! Brute-force lockout bookkeeping, keyed by (origin ip, account email).
//!
//! State machine per key: Fresh -> Active(count) -> Locked(since) ->
//! Active(count=1) once the lock duration has elapsed. The
//! increment-and-maybe-lock step must be atomic per key: two concurrent
//! failures for the same key must not both observe "below threshold" when
//! their combined effect should lock. A tracker-level mutex serializes the
//! read-modify-write, which itself runs inside a transaction.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::{
    config::LockoutConfig,
    db::{errors::Result, models::login_attempts::LoginAttempt},
};

#[derive(Clone)]
pub struct AttemptTracker {
    pool: SqlitePool,
    config: LockoutConfig,
    gate: Arc<Mutex<()>>,
}

impl AttemptTracker {
    pub fn new(pool: SqlitePool, config: LockoutConfig) -> Self {
        Self {
            pool,
            config,
            gate: Arc::new(Mutex::new(())),
        }
    }

    fn lock_duration(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.lock_duration).unwrap_or_else(|_| chrono::Duration::minutes(15))
    }

    fn reset_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.reset_window).unwrap_or_else(|_| chrono::Duration::hours(1))
    }

    fn lock_expired(&self, locked_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match locked_at {
            Some(since) => now - since >= self.lock_duration(),
            // locked without locked_at violates the record invariant; treat
            // the lock as expired rather than locking out forever
            None => true,
        }
    }

    async fn fetch(db: &mut sqlx::SqliteConnection, ip: &str, email: &str) -> Result<Option<LoginAttempt>> {
        let record = sqlx::query_as::<_, LoginAttempt>(
            "SELECT ip, email, attempts, last_attempt, locked, locked_at
             FROM login_attempts WHERE ip = ? AND email = ?",
        )
        .bind(ip)
        .bind(email)
        .fetch_optional(db)
        .await?;

        Ok(record)
    }

    /// Register one failed attempt. Returns true when the key is (now)
    /// locked out.
    #[instrument(skip(self), err)]
    pub async fn record_attempt(&self, ip: &str, email: &str) -> Result<bool> {
        let _guard = self.gate.lock().await;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let record = Self::fetch(&mut tx, ip, email).await?;

        let locked = match record {
            None => {
                sqlx::query(
                    "INSERT INTO login_attempts (ip, email, attempts, last_attempt, locked, locked_at)
                     VALUES (?, ?, 1, ?, FALSE, NULL)",
                )
                .bind(ip)
                .bind(email)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                false
            }
            Some(record) if record.locked => {
                if self.lock_expired(record.locked_at, now) {
                    // Lock has run out: this failure starts a fresh streak
                    sqlx::query(
                        "UPDATE login_attempts
                         SET attempts = 1, last_attempt = ?, locked = FALSE, locked_at = NULL
                         WHERE ip = ? AND email = ?",
                    )
                    .bind(now)
                    .bind(ip)
                    .bind(email)
                    .execute(&mut *tx)
                    .await?;
                    false
                } else {
                    // Still locked: no increment
                    true
                }
            }
            Some(record) => {
                if now - record.last_attempt >= self.reset_window() {
                    sqlx::query(
                        "UPDATE login_attempts SET attempts = 1, last_attempt = ? WHERE ip = ? AND email = ?",
                    )
                    .bind(now)
                    .bind(ip)
                    .bind(email)
                    .execute(&mut *tx)
                    .await?;
                    false
                } else {
                    let attempts = record.attempts + 1;
                    let lock_now = attempts >= i64::from(self.config.max_attempts);
                    sqlx::query(
                        "UPDATE login_attempts
                         SET attempts = ?, last_attempt = ?, locked = ?, locked_at = ?
                         WHERE ip = ? AND email = ?",
                    )
                    .bind(attempts)
                    .bind(now)
                    .bind(lock_now)
                    .bind(lock_now.then_some(now))
                    .bind(ip)
                    .bind(email)
                    .execute(&mut *tx)
                    .await?;
                    if lock_now {
                        info!("lockout engaged for {email} from {ip} after {attempts} failures");
                    }
                    lock_now
                }
            }
        };

        tx.commit().await?;
        Ok(locked)
    }

    /// Whether the key is currently locked out. Clears an expired lock as a
    /// side effect.
    #[instrument(skip(self), err)]
    pub async fn is_blocked(&self, ip: &str, email: &str) -> Result<bool> {
        let _guard = self.gate.lock().await;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let record = Self::fetch(&mut tx, ip, email).await?;

        let blocked = match record {
            Some(record) if record.locked => {
                if self.lock_expired(record.locked_at, now) {
                    sqlx::query(
                        "UPDATE login_attempts
                         SET attempts = 1, locked = FALSE, locked_at = NULL
                         WHERE ip = ? AND email = ?",
                    )
                    .bind(ip)
                    .bind(email)
                    .execute(&mut *tx)
                    .await?;
                    false
                } else {
                    true
                }
            }
            _ => false,
        };

        tx.commit().await?;
        Ok(blocked)
    }

    /// Clear counter and lock after a fully successful two-factor login.
    #[instrument(skip(self), err)]
    pub async fn reset(&self, ip: &str, email: &str) -> Result<()> {
        sqlx::query("DELETE FROM login_attempts WHERE ip = ? AND email = ?")
            .bind(ip)
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
