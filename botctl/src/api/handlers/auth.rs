//! Login, second factor, logout, audit log, and enrollment endpoints.
//!
//! Rejection messages here are deliberately generic; the precise cause of
//! every failure lives in the audit log only.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::{
    api::models::auth::{
        LoginRequest, LoginResponse, SecondFactorRequest, SecondFactorResponse, SecondFactorSetupResponse, StatusResponse,
    },
    auth::{
        flow::{self, LoginOutcome},
        guard::CurrentAdmin,
        totp,
        utils::{bearer_token, ClientInfo},
    },
    db::{handlers::AuditLog, models::audit_log::LoginAuditEntry},
    errors::Error,
    AppState,
};

/// Identical for wrong email and wrong password.
const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
const INVALID_CODE_MESSAGE: &str = "Invalid authentication code";
const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";
const LOCKED_MESSAGE: &str = "Too many failed attempts. Try again later.";

/// First login stage: verify email and password.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Password accepted, second factor required", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = LoginResponse),
        (status = 429, description = "Too many failed attempts", body = LoginResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    origin: ClientInfo,
    Json(request): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), Error> {
    match flow::login(&state, &request.email, &request.password, &origin).await? {
        LoginOutcome::AwaitingSecondFactor { temp_token } => Ok((
            StatusCode::OK,
            Json(LoginResponse {
                success: true,
                message: "Second authentication factor required".to_string(),
                temp_token: Some(temp_token),
                require_second_factor: Some(true),
            }),
        )),
        LoginOutcome::Locked => Ok((StatusCode::TOO_MANY_REQUESTS, Json(LoginResponse::failure(LOCKED_MESSAGE)))),
        _ => Ok((StatusCode::UNAUTHORIZED, Json(LoginResponse::failure(INVALID_CREDENTIALS_MESSAGE)))),
    }
}

/// Second login stage: exchange the temporary token plus a one-time code
/// for an access token.
#[utoipa::path(
    post,
    path = "/api/verify-second-factor",
    request_body = SecondFactorRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Authenticated", body = SecondFactorResponse),
        (status = 401, description = "Invalid token or code", body = SecondFactorResponse),
        (status = 429, description = "Too many failed attempts", body = SecondFactorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_second_factor(
    State(state): State<AppState>,
    origin: ClientInfo,
    Json(request): Json<SecondFactorRequest>,
) -> Result<(StatusCode, Json<SecondFactorResponse>), Error> {
    match flow::verify_second_factor(&state, &request.email, &request.temp_token, &request.code, &origin).await? {
        LoginOutcome::Authenticated { access_token } => Ok((
            StatusCode::OK,
            Json(SecondFactorResponse {
                success: true,
                message: "Login successful".to_string(),
                access_token: Some(access_token),
            }),
        )),
        LoginOutcome::Locked => Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Json(SecondFactorResponse::failure(LOCKED_MESSAGE)),
        )),
        LoginOutcome::InvalidToken => Ok((
            StatusCode::UNAUTHORIZED,
            Json(SecondFactorResponse::failure(INVALID_TOKEN_MESSAGE)),
        )),
        _ => Ok((
            StatusCode::UNAUTHORIZED,
            Json(SecondFactorResponse::failure(INVALID_CODE_MESSAGE)),
        )),
    }
}

/// Verify the bearer access token and destroy its session.
#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "auth",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Session terminated", body = StatusResponse),
        (status = 401, description = "Missing or invalid access token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<StatusResponse>, Error> {
    let token = bearer_token(&headers).ok_or(Error::Unauthenticated { message: None })?;
    flow::logout(&state, token).await?;

    Ok(Json(StatusResponse {
        success: true,
        message: "Logged out".to_string(),
    }))
}

/// Recent authentication attempts, newest first.
#[utoipa::path(
    get,
    path = "/api/login-audit-log",
    tag = "auth",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Audit entries, newest first", body = [LoginAuditEntry]),
        (status = 401, description = "Missing or invalid access token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login_audit_log(State(state): State<AppState>, _admin: CurrentAdmin) -> Result<Json<Vec<LoginAuditEntry>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let entries = AuditLog::new(&mut conn).list(state.config.auth.audit_log_limit).await?;

    Ok(Json(entries))
}

/// Enrollment data for authenticator apps.
#[utoipa::path(
    get,
    path = "/api/setup-second-factor",
    tag = "auth",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Provisioning URI and raw seed", body = SecondFactorSetupResponse),
        (status = 401, description = "Missing or invalid access token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn setup_second_factor(State(state): State<AppState>, _admin: CurrentAdmin) -> Result<Json<SecondFactorSetupResponse>, Error> {
    let credentials = &state.credentials;
    let otpauth_url = totp::provisioning_url(&state.config.auth.totp_issuer, &credentials.email, &credentials.totp_seed)?;

    Ok(Json(SecondFactorSetupResponse {
        otpauth_url,
        secret: credentials.totp_seed.clone(),
    }))
}
