//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` and can be set via
//! `-f` flag or `BOTCTL_CONFIG`. Environment variables prefixed with
//! `BOTCTL_` override YAML values; nested fields use double underscores,
//! e.g. `BOTCTL_AUTH__LOCKOUT__MAX_ATTEMPTS=3`.
//!
//! Durations are human-readable (`"15m"`, `"24h"`, `"1s"`).

use clap::Parser;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Simple CLI args - just for specifying the config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "BOTCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// SQLite database settings
    pub database: DatabaseConfig,
    /// Path of the admin credential record (bootstrapped on first run)
    pub credentials_path: PathBuf,
    /// Authentication behavior
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8085,
            database: DatabaseConfig::default(),
            credentials_path: PathBuf::from("config/admin.json"),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration: YAML file first, then `BOTCTL_` env overrides.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let config: Config = Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("BOTCTL_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("database.url must not be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }
        if self.auth.lockout.max_attempts == 0 {
            anyhow::bail!("auth.lockout.max_attempts must be at least 1");
        }
        if self.auth.session.ttl.is_zero() {
            anyhow::bail!("auth.session.ttl must be non-zero");
        }
        if self.auth.tokens.ttl.is_zero() {
            anyhow::bail!("auth.tokens.ttl must be non-zero");
        }
        if self.auth.session.sweep_interval.is_zero() {
            anyhow::bail!("auth.session.sweep_interval must be non-zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite connection URL; the file is created on first run
    pub url: String,
    /// Maximum number of pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:botctl.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub session: SessionConfig,
    pub tokens: TokenConfig,
    pub lockout: LockoutConfig,
    /// Fixed delay applied to every failed credential or code check,
    /// including unknown-email paths, to blunt timing-based enumeration
    #[serde(with = "humantime_serde")]
    pub failure_delay: Duration,
    /// Issuer shown by authenticator apps after enrollment
    pub totp_issuer: String,
    /// Maximum number of audit entries returned by the audit endpoint
    pub audit_log_limit: i64,
    pub cors: CorsConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            tokens: TokenConfig::default(),
            lockout: LockoutConfig::default(),
            failure_delay: Duration::from_secs(1),
            totp_issuer: "Bot Control Panel".to_string(),
            audit_log_limit: 100,
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Session lifetime
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// How often the background sweep deletes expired sessions
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 3600),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenConfig {
    /// Bearer token lifetime (both temporary and access tokens)
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 3600),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockoutConfig {
    /// Failures within the reset window before a key locks
    pub max_attempts: u32,
    /// How long a lock lasts before it self-expires
    #[serde(with = "humantime_serde")]
    pub lock_duration: Duration,
    /// Inactivity period after which the failure count restarts
    #[serde(with = "humantime_serde")]
    pub reset_window: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_duration: Duration::from_secs(15 * 60),
            reset_window: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; empty means any origin
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: false,
        }
    }
}
