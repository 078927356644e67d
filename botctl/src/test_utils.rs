//! Shared constructors for tests.

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::{str::FromStr, sync::OnceLock, time::Duration};

use crate::{
    auth::{lockout::AttemptTracker, password, tokens::TokenService, totp},
    config::Config,
    credentials::AdminCredentials,
    AppState,
};

pub const TEST_EMAIL: &str = "admin@example.com";
pub const TEST_PASSWORD: &str = "CorrectPass1!";
pub const TEST_SEED: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";
pub const TEST_SIGNING_SECRET: &str = "test-signing-secret-with-plenty-of-entropy";

/// Fresh in-memory database with migrations applied. One connection: with
/// SQLite, every pooled connection to `:memory:` would otherwise be its
/// own database.
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").expect("parse sqlite url");
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("connect to in-memory sqlite");

    crate::migrator().run(&pool).await.expect("run migrations");
    pool
}

/// Test config: lockout defaults, but no failure delay so tests stay fast.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.failure_delay = Duration::ZERO;
    config
}

fn test_password_hash() -> String {
    // Argon2 at production cost is slow; hash the fixture password once
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| password::hash_string(TEST_PASSWORD).expect("hash test password"))
        .clone()
}

pub fn test_credentials() -> AdminCredentials {
    AdminCredentials {
        email: TEST_EMAIL.to_string(),
        password_hash: test_password_hash(),
        totp_seed: TEST_SEED.to_string(),
        token_signing_secret: TEST_SIGNING_SECRET.to_string(),
    }
}

pub async fn create_test_state(pool: SqlitePool) -> AppState {
    create_test_state_with_config(pool, test_config()).await
}

pub async fn create_test_state_with_config(pool: SqlitePool, config: Config) -> AppState {
    let credentials = test_credentials();
    let tokens = TokenService::new(&credentials.token_signing_secret, config.auth.tokens.ttl);
    let tracker = AttemptTracker::new(pool.clone(), config.auth.lockout.clone());

    AppState::builder()
        .db(pool)
        .config(config)
        .credentials(credentials)
        .tokens(tokens)
        .tracker(tracker)
        .build()
}

pub fn create_test_server(state: AppState) -> axum_test::TestServer {
    let router = crate::build_router(&state).expect("build router");
    axum_test::TestServer::new(router).expect("create test server")
}

/// The code an authenticator app would show right now for the fixture seed.
pub fn current_totp_code() -> String {
    totp::current_code(TEST_SEED).expect("generate current code")
}
