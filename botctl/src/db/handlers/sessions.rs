//! Database repository for admin panel sessions.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::{
    auth::password,
    db::{
        errors::Result,
        models::sessions::{Session, SessionCreateDBRequest},
    },
    types::abbrev_id,
};

pub struct Sessions<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Sessions<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Create a session with a fresh unguessable id and `expires_at = now + ttl`.
    #[instrument(skip(self, request), fields(email = %request.email), err)]
    pub async fn create(&mut self, request: &SessionCreateDBRequest) -> Result<Session> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(request.ttl).unwrap_or_else(|_| chrono::Duration::hours(24));

        let session = Session {
            id: password::generate_session_id(),
            email: request.email.clone(),
            ip: request.ip.clone(),
            user_agent: request.user_agent.clone(),
            created_at: now,
            expires_at: now + ttl,
        };

        sqlx::query(
            "INSERT INTO sessions (id, email, ip, user_agent, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.email)
        .bind(&session.ip)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&mut *self.db)
        .await?;

        Ok(session)
    }

    #[instrument(skip(self, id), fields(session_id = %abbrev_id(id)), err)]
    pub async fn get(&mut self, id: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, email, ip, user_agent, created_at, expires_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(session)
    }

    /// Delete a session. Idempotent: deleting an absent id is not an error.
    #[instrument(skip(self, id), fields(session_id = %abbrev_id(id)), err)]
    pub async fn delete(&mut self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every session past its expiry. Returns the number removed.
    /// Runs from the background sweep; deletes are idempotent and
    /// uncoordinated with request handling.
    #[instrument(skip(self), err)]
    pub async fn delete_expired(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
