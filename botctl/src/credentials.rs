//! The file-backed admin identity record.
//!
//! A single JSON document holds the administrator email, the Argon2
//! password digest, the base32 second-factor seed, and the token signing
//! secret. The record is loaded once at startup into [`crate::AppState`]
//! and passed by reference; nothing re-reads it per request.
//!
//! The signing secret is generated once from the OS random source and never
//! regenerated implicitly - regenerating it would invalidate every live
//! token and session.

use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

use crate::{auth::password, errors::Error};

/// Bootstrap identity written on first run. The password is `admin` and
/// must be changed after enrollment.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";
const DEFAULT_TOTP_SEED: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";
const SIGNING_SECRET_BYTES: usize = 48;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub email: String,
    pub password_hash: String,
    pub totp_seed: String,
    pub token_signing_secret: String,
}

/// Earlier revisions shared one `secret` between the second factor and
/// token signing, and kept the digest under `password`.
#[derive(Debug, Deserialize)]
struct LegacyAdminCredentials {
    email: String,
    password: String,
    secret: String,
}

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the admin identity. Idempotent: a missing file is bootstrapped
    /// with defaults, and legacy shared-secret documents are upgraded to
    /// independent secrets and persisted before returning. Never returns a
    /// partial record.
    #[instrument(skip(self), fields(path = %self.path.display()), err)]
    pub fn load(&self) -> Result<AdminCredentials, Error> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return self.bootstrap(),
            Err(e) => {
                return Err(Error::Config {
                    message: format!("read {}: {e}", self.path.display()),
                })
            }
        };

        if let Ok(credentials) = serde_json::from_slice::<AdminCredentials>(&raw) {
            return Ok(credentials);
        }

        match serde_json::from_slice::<LegacyAdminCredentials>(&raw) {
            Ok(legacy) => {
                info!("upgrading legacy credential record to independent secrets");
                let credentials = AdminCredentials {
                    email: legacy.email,
                    password_hash: legacy.password,
                    totp_seed: legacy.secret,
                    token_signing_secret: generate_signing_secret(),
                };
                self.save(&credentials)?;
                Ok(credentials)
            }
            Err(e) => Err(Error::Config {
                message: format!("decode {}: {e}", self.path.display()),
            }),
        }
    }

    /// Persist the record via a temp file and atomic rename, so a crash
    /// mid-write never leaves a partial document behind.
    #[instrument(skip(self, credentials), fields(path = %self.path.display()), err)]
    pub fn save(&self, credentials: &AdminCredentials) -> Result<(), Error> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| Error::Config {
            message: format!("create {}: {e}", parent.display()),
        })?;

        let json = serde_json::to_vec_pretty(credentials).map_err(|e| Error::Config {
            message: format!("encode credentials: {e}"),
        })?;

        let mut file = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::Config {
            message: format!("create temp file in {}: {e}", parent.display()),
        })?;
        file.write_all(&json).map_err(|e| Error::Config {
            message: format!("write credentials: {e}"),
        })?;
        file.persist(&self.path).map_err(|e| Error::Config {
            message: format!("replace {}: {e}", self.path.display()),
        })?;

        Ok(())
    }

    fn bootstrap(&self) -> Result<AdminCredentials, Error> {
        info!("no credential record at {}, creating defaults", self.path.display());

        let credentials = AdminCredentials {
            email: DEFAULT_ADMIN_EMAIL.to_string(),
            password_hash: password::hash_string(DEFAULT_ADMIN_PASSWORD).map_err(|e| Error::Config {
                message: format!("hash default password: {e}"),
            })?,
            totp_seed: DEFAULT_TOTP_SEED.to_string(),
            token_signing_secret: generate_signing_secret(),
        };

        self.save(&credentials)?;
        Ok(credentials)
    }
}

/// A fresh signing secret from the OS random source, base64-encoded.
pub fn generate_signing_secret() -> String {
    let mut bytes = [0u8; SIGNING_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join("admin.json"))
    }

    #[test]
    fn test_bootstrap_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let credentials = store.load().unwrap();
        assert_eq!(credentials.email, DEFAULT_ADMIN_EMAIL);
        assert!(password::verify_string(DEFAULT_ADMIN_PASSWORD, &credentials.password_hash).unwrap());
        assert!(!credentials.totp_seed.is_empty());
        assert!(!credentials.token_signing_secret.is_empty());
        assert_ne!(credentials.totp_seed, credentials.token_signing_secret);
        assert!(dir.path().join("admin.json").exists());
    }

    #[test]
    fn test_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let first = store.load().unwrap();
        let second = store.load().unwrap();

        // The signing secret must not be silently regenerated
        assert_eq!(first.token_signing_secret, second.token_signing_secret);
        assert_eq!(first.password_hash, second.password_hash);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let credentials = AdminCredentials {
            email: "ops@example.com".to_string(),
            password_hash: "$argon2id$fake".to_string(),
            totp_seed: "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ".to_string(),
            token_signing_secret: generate_signing_secret(),
        };
        store.save(&credentials).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.email, "ops@example.com");
        assert_eq!(loaded.totp_seed, credentials.totp_seed);
        assert_eq!(loaded.token_signing_secret, credentials.token_signing_secret);
    }

    #[test]
    fn test_legacy_record_is_upgraded_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "email": "admin@example.com",
                "password": "$argon2id$legacy-digest",
                "secret": "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP"
            })
            .to_string(),
        )
        .unwrap();

        let store = CredentialStore::new(&path);
        let upgraded = store.load().unwrap();

        assert_eq!(upgraded.email, "admin@example.com");
        assert_eq!(upgraded.password_hash, "$argon2id$legacy-digest");
        // The shared secret stays as the second-factor seed; signing gets
        // its own secret
        assert_eq!(upgraded.totp_seed, "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP");
        assert_ne!(upgraded.token_signing_secret, upgraded.totp_seed);
        assert!(!upgraded.token_signing_secret.is_empty());

        // The upgrade is persisted: a second load parses the new format and
        // keeps the same signing secret
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.token_signing_secret, upgraded.token_signing_secret);
    }

    #[test]
    fn test_corrupt_record_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = CredentialStore::new(&path);
        assert!(matches!(store.load(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_signing_secrets_are_unique() {
        assert_ne!(generate_signing_secret(), generate_signing_secret());
    }
}
