//! # botctl: Admin Control Panel for a Chat Bot Deployment
//!
//! `botctl` is the backend of the web control panel administrators use to
//! manage a chat-bot deployment. This crate implements the panel's
//! authentication core: a two-stage login (password, then a time-based
//! one-time code), signed bearer tokens, persistent revocable sessions,
//! brute-force lockout per (origin, account) pair, and an append-only
//! audit log of every authentication attempt.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum)
//! for the HTTP layer and SQLite (via SQLx) for persistence. The single
//! administrator identity - email, password digest, second-factor seed,
//! and token signing secret - lives in a small JSON document that is
//! bootstrapped with safe defaults on first run and upgraded transparently
//! from the legacy shared-secret layout.
//!
//! ### Request Flow
//!
//! `POST /api/login` checks the lockout gate, then email and password, and
//! answers with a temporary token. `POST /api/verify-second-factor`
//! exchanges that token plus a valid one-time code for an access token
//! bound to a freshly stored session. Every protected endpoint verifies
//! the bearer access token *and* resolves its session row - deleting the
//! session (logout, expiry sweep) revokes the token immediately, however
//! long its signature would otherwise stay valid.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) holds the handlers and wire models. The
//! **authentication layer** ([`auth`]) holds the login orchestrator, the
//! password hasher, token service, one-time-code validator, lockout
//! tracker, and the request guard. The **database layer** ([`db`]) uses
//! the repository pattern over SQLx for sessions, attempt counters, and
//! the audit log. **Background services** run alongside the HTTP server:
//! an hourly sweep deletes expired sessions independently of request
//! handling.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use botctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = botctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     botctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
mod types;

#[cfg(test)]
pub mod test_utils;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use bon::Builder;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{
    cors::{self, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, error, info, instrument, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    auth::{lockout::AttemptTracker, tokens::TokenService},
    credentials::{AdminCredentials, CredentialStore},
    db::handlers::Sessions,
    openapi::ApiDoc,
};
pub use config::Config;

/// Application state shared across all request handlers.
///
/// Constructed once at startup and handed to the router; the credential
/// record, token service, and attempt tracker ride along so handlers never
/// reach for globals or re-read files per request.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub credentials: AdminCredentials,
    pub tokens: TokenService,
    pub tracker: AttemptTracker,
}

/// Get the botctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.cors;

    if cors_config.allowed_origins.is_empty() {
        if cors_config.allow_credentials {
            anyhow::bail!("auth.cors.allow_credentials requires explicit auth.cors.allowed_origins");
        }
        return Ok(CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods(cors::Any)
            .allow_headers(cors::Any));
    }

    let mut origins = Vec::new();
    for origin in &cors_config.allowed_origins {
        origins.push(origin.parse::<HeaderValue>()?);
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION])
        .allow_credentials(cors_config.allow_credentials))
}

/// Build the application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/api/login", post(api::handlers::auth::login))
        .route("/api/verify-second-factor", post(api::handlers::auth::verify_second_factor))
        .route("/api/logout", post(api::handlers::auth::logout))
        .route("/api/login-audit-log", get(api::handlers::auth::login_audit_log))
        .route("/api/setup-second-factor", get(api::handlers::auth::setup_second_factor))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(api_routes)
        .merge(Scalar::with_url("/admin/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;

    Ok(router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    ))
}

/// Container for background tasks and their lifecycle management.
///
/// Holds the expired-session sweeper. The `drop_guard` cancels the
/// shutdown token if the container is dropped without an explicit
/// [`shutdown`](BackgroundServices::shutdown).
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: tokio_util::sync::CancellationToken,
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Spawn the expired-session sweep: an independent repeating task with
/// idempotent deletes, decoupled from request handling.
fn setup_background_services(pool: SqlitePool, config: Config, shutdown_token: tokio_util::sync::CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    let sweep_interval = config.auth.session.sweep_interval;
    let sweep_shutdown = shutdown_token.clone();
    let handle = tokio::spawn(async move {
        info!("Starting expired-session sweep every {sweep_interval:?}");
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            tokio::select! {
                _ = sweep_shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match pool.acquire().await {
                        Ok(mut conn) => match Sessions::new(&mut conn).delete_expired().await {
                            Ok(0) => {}
                            Ok(removed) => info!("Expired-session sweep removed {removed} sessions"),
                            Err(e) => error!("Expired-session sweep failed: {e}"),
                        },
                        Err(e) => error!("Expired-session sweep could not acquire a connection: {e}"),
                    }
                }
            }
        }
    });
    background_tasks.push(handle);

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects the database, runs
///    migrations, loads (or bootstraps) the admin credentials, and starts
///    background services.
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles
///    requests until the shutdown future resolves.
pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting control panel with configuration: {:#?}", config);

        let pool = db::pools::connect(&config.database).await?;
        migrator().run(&pool).await?;

        let credentials = CredentialStore::new(&config.credentials_path).load()?;
        let tokens = TokenService::new(&credentials.token_signing_secret, config.auth.tokens.ttl);
        let tracker = AttemptTracker::new(pool.clone(), config.auth.lockout.clone());

        let shutdown_token = tokio_util::sync::CancellationToken::new();
        let bg_services = setup_background_services(pool.clone(), config.clone(), shutdown_token);

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .credentials(credentials)
            .tokens(tokens)
            .tracker(tracker)
            .build();

        let router = build_router(&state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Control panel listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Shutdown background tasks and wait for them to complete
        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
