//! The two-stage login orchestrator.
//!
//! Composes the credential record, password hasher, TOTP validator,
//! attempt tracker, session store, and token service into the protocol
//! exposed at the boundary: Anonymous -> AwaitingSecondFactor(temp token)
//! -> Authenticated(session).
//!
//! Every authentication attempt, successful or not, is appended to the
//! audit log before the outcome is returned - lockout rejections included.
//! Failed credential and code checks share one fixed delay and one generic
//! client message so neither the response text nor its timing reveals
//! which part was wrong.

use tracing::{info, instrument};

use crate::{
    auth::{password, totp, utils::ClientInfo},
    db::{
        handlers::{AuditLog, Sessions},
        models::{audit_log::AuditEntryCreateDBRequest, sessions::SessionCreateDBRequest},
    },
    errors::Error,
    types::abbrev_id,
    AppState,
};

/// Outcome of a login-protocol step. Client-caused rejections are values,
/// not errors; `Error` is reserved for storage and internal faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    AwaitingSecondFactor { temp_token: String },
    Authenticated { access_token: String },
    Locked,
    InvalidCredentials,
    InvalidCode,
    InvalidToken,
}

async fn audit(state: &AppState, email: &str, origin: &ClientInfo, success: bool, message: &str) -> Result<(), Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    AuditLog::new(&mut conn)
        .append(&AuditEntryCreateDBRequest {
            email: email.to_string(),
            ip: origin.ip.clone(),
            user_agent: origin.user_agent.clone(),
            success,
            message: message.to_string(),
        })
        .await?;
    Ok(())
}

/// First stage: email + password. On success the caller receives a
/// temporary token and must come back with a one-time code.
#[instrument(skip(state, password_input, origin), fields(ip = %origin.ip), err)]
pub async fn login(state: &AppState, email: &str, password_input: &str, origin: &ClientInfo) -> Result<LoginOutcome, Error> {
    if state.tracker.is_blocked(&origin.ip, email).await? {
        audit(state, email, origin, false, "login rejected: origin locked out").await?;
        return Ok(LoginOutcome::Locked);
    }

    let credentials = &state.credentials;
    let email_matches = email == credentials.email;

    // Skip the hash for unknown emails; the fixed delay below covers the
    // timing difference.
    let password_ok = if email_matches {
        let input = password_input.to_string();
        let hash = credentials.password_hash.clone();
        tokio::task::spawn_blocking(move || password::verify_string(&input, &hash))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn password verification task: {e}"),
            })??
    } else {
        false
    };

    if !password_ok {
        let locked = state.tracker.record_attempt(&origin.ip, email).await?;
        let cause = if email_matches { "invalid password" } else { "unknown email" };
        let message = if locked {
            format!("{cause}; lockout engaged")
        } else {
            cause.to_string()
        };
        audit(state, email, origin, false, &message).await?;
        tokio::time::sleep(state.config.auth.failure_delay).await;
        return Ok(if locked { LoginOutcome::Locked } else { LoginOutcome::InvalidCredentials });
    }

    let temp_token = state.tokens.issue_temporary(email)?;
    audit(state, email, origin, true, "password accepted, awaiting second factor").await?;
    Ok(LoginOutcome::AwaitingSecondFactor { temp_token })
}

/// Second stage: temporary token + one-time code. On success the attempt
/// counter resets, a session row is created, and an access token bound to
/// it is returned.
#[instrument(skip(state, temp_token, code, origin), fields(ip = %origin.ip), err)]
pub async fn verify_second_factor(
    state: &AppState,
    email: &str,
    temp_token: &str,
    code: &str,
    origin: &ClientInfo,
) -> Result<LoginOutcome, Error> {
    if state.tracker.is_blocked(&origin.ip, email).await? {
        audit(state, email, origin, false, "second factor rejected: origin locked out").await?;
        return Ok(LoginOutcome::Locked);
    }

    let token_email = match state.tokens.verify_temporary(temp_token) {
        Ok(token_email) => token_email,
        Err(e) => {
            audit(state, email, origin, false, &format!("second factor rejected: {e}")).await?;
            return Ok(LoginOutcome::InvalidToken);
        }
    };
    if token_email != email {
        audit(state, email, origin, false, "second factor rejected: token email mismatch").await?;
        return Ok(LoginOutcome::InvalidToken);
    }

    if !totp::validate(code, &state.credentials.totp_seed) {
        let locked = state.tracker.record_attempt(&origin.ip, email).await?;
        let message = if locked {
            "invalid one-time code; lockout engaged"
        } else {
            "invalid one-time code"
        };
        audit(state, email, origin, false, message).await?;
        tokio::time::sleep(state.config.auth.failure_delay).await;
        return Ok(if locked { LoginOutcome::Locked } else { LoginOutcome::InvalidCode });
    }

    state.tracker.reset(&origin.ip, email).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let session = Sessions::new(&mut conn)
        .create(&SessionCreateDBRequest {
            email: email.to_string(),
            ip: origin.ip.clone(),
            user_agent: origin.user_agent.clone(),
            ttl: state.config.auth.session.ttl,
        })
        .await?;
    drop(conn);

    let access_token = state.tokens.issue_access(email, &session.id)?;
    audit(state, email, origin, true, "second factor accepted, session established").await?;
    info!("admin session {} established for {email}", abbrev_id(&session.id));

    Ok(LoginOutcome::Authenticated { access_token })
}

/// Verify the access token and delete its session unconditionally.
/// Idempotent: logging out an already-dead session still succeeds.
#[instrument(skip(state, access_token), err)]
pub async fn logout(state: &AppState, access_token: &str) -> Result<(), Error> {
    let (_email, session_id) = state.tokens.verify_access(access_token)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Sessions::new(&mut conn).delete(&session_id).await?;
    info!("admin session {} terminated", abbrev_id(&session_id));

    Ok(())
}
