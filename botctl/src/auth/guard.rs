//! Extractor guarding every protected endpoint.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;

use crate::{
    auth::utils::bearer_token,
    db::{handlers::Sessions, models::sessions::Session},
    errors::{Error, Result},
    AppState,
};

/// The authenticated administrator, resolved from a bearer access token.
///
/// A token's signature being valid is necessary but not sufficient: the
/// session it names must still exist in the store. A missing session
/// rejects the request, and an expired one is deleted on sight. The email
/// attached as caller identity comes from the resolved session row.
#[derive(Debug, Clone)]
pub struct CurrentAdmin {
    pub email: String,
    pub session: Session,
}

impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers).ok_or(Error::Unauthenticated { message: None })?;

        let (_token_email, session_id) = state
            .tokens
            .verify_access(token)
            .map_err(|_| Error::Unauthenticated { message: None })?;

        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut sessions = Sessions::new(&mut conn);

        let session = sessions
            .get(&session_id)
            .await?
            .ok_or(Error::Unauthenticated { message: None })?;

        if session.expires_at <= Utc::now() {
            sessions.delete(&session.id).await?;
            return Err(Error::Unauthenticated { message: None });
        }

        Ok(CurrentAdmin {
            email: session.email.clone(),
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::models::sessions::SessionCreateDBRequest,
        test_utils::{create_test_state, memory_pool},
    };
    use axum::http::Request;
    use std::time::Duration;

    fn parts_with_bearer(token: &str) -> Parts {
        let (parts, _body) = Request::builder()
            .uri("http://localhost/api/login-audit-log")
            .header("authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    async fn create_session(state: &AppState, ttl: Duration) -> Session {
        let mut conn = state.db.acquire().await.unwrap();
        Sessions::new(&mut conn)
            .create(&SessionCreateDBRequest {
                email: state.credentials.email.clone(),
                ip: "127.0.0.1".to_string(),
                user_agent: "test-agent".to_string(),
                ttl,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_access_token_resolves_admin() {
        let state = create_test_state(memory_pool().await).await;
        let session = create_session(&state, Duration::from_secs(3600)).await;
        let token = state.tokens.issue_access(&state.credentials.email, &session.id).unwrap();

        let mut parts = parts_with_bearer(&token);
        let admin = CurrentAdmin::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(admin.email, state.credentials.email);
        assert_eq!(admin.session.id, session.id);
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected() {
        let state = create_test_state(memory_pool().await).await;
        let (mut parts, _body) = Request::builder().uri("http://localhost/test").body(()).unwrap().into_parts();

        let result = CurrentAdmin::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[tokio::test]
    async fn test_temporary_token_is_rejected() {
        let state = create_test_state(memory_pool().await).await;
        let token = state.tokens.issue_temporary(&state.credentials.email).unwrap();

        let mut parts = parts_with_bearer(&token);
        let result = CurrentAdmin::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[tokio::test]
    async fn test_deleted_session_invalidates_token() {
        let state = create_test_state(memory_pool().await).await;
        let session = create_session(&state, Duration::from_secs(3600)).await;
        let token = state.tokens.issue_access(&state.credentials.email, &session.id).unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        Sessions::new(&mut conn).delete(&session.id).await.unwrap();
        drop(conn);

        // The token signature is still valid and unexpired; the session
        // being gone must reject it anyway
        let mut parts = parts_with_bearer(&token);
        let result = CurrentAdmin::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_deleted() {
        let state = create_test_state(memory_pool().await).await;
        let session = create_session(&state, Duration::from_secs(3600)).await;
        let token = state.tokens.issue_access(&state.credentials.email, &session.id).unwrap();

        sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
            .bind(Utc::now() - chrono::Duration::minutes(1))
            .bind(&session.id)
            .execute(&state.db)
            .await
            .unwrap();

        let mut parts = parts_with_bearer(&token);
        let result = CurrentAdmin::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));

        // Rejection deletes the expired row
        let mut conn = state.db.acquire().await.unwrap();
        assert!(Sessions::new(&mut conn).get(&session.id).await.unwrap().is_none());
    }
}
