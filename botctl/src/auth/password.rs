//! Password hashing, verification, and strength policy.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;

use crate::errors::Error;

/// Length of generated session identifiers.
pub const SESSION_ID_LEN: usize = 32;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Deliberately above the library defaults (19 MiB / 2 iterations).
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MiB
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// Hash a password using Argon2id with a per-hash random salt.
pub fn hash_string(input: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2Params::default().to_argon2()?;

    let hash = argon2.hash_password(input.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash password: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Verify a password against a hash.
///
/// Note: verification uses the parameters embedded in the hash itself, so
/// hashes created under older parameter choices keep verifying.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse password hash: {e}"),
    })?;

    Ok(Argon2::default().verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

/// Generate a session identifier: fixed-length alphanumeric from the
/// thread-local CSPRNG.
pub fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// First failing password-strength rule. Checks run in a fixed order
/// (length, lowercase, uppercase, digit, symbol) so the reported reason is
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StrengthIssue {
    #[error("password must be at least 8 characters")]
    TooShort,
    #[error("password must contain a lowercase letter")]
    MissingLowercase,
    #[error("password must contain an uppercase letter")]
    MissingUppercase,
    #[error("password must contain a digit")]
    MissingDigit,
    #[error("password must contain a symbol")]
    MissingSymbol,
}

/// Evaluate the password strength policy.
pub fn check_strength(password: &str) -> Result<(), StrengthIssue> {
    if password.chars().count() < 8 {
        return Err(StrengthIssue::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(StrengthIssue::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(StrengthIssue::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(StrengthIssue::MissingDigit);
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err(StrengthIssue::MissingSymbol);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_string("CorrectPass1!").unwrap();

        assert!(!hash.is_empty());
        assert!(verify_string("CorrectPass1!", &hash).unwrap());
        assert!(!verify_string("WrongPass1!", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let hash1 = hash_string("same_password").unwrap();
        let hash2 = hash_string("same_password").unwrap();

        // Salted: same input must not produce the same digest
        assert_ne!(hash1, hash2);
        assert!(verify_string("same_password", &hash1).unwrap());
        assert!(verify_string("same_password", &hash2).unwrap());
    }

    #[test]
    fn test_verify_garbage_hash_is_an_error() {
        assert!(verify_string("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_generate_session_id() {
        let id1 = generate_session_id();
        let id2 = generate_session_id();

        assert_eq!(id1.len(), SESSION_ID_LEN);
        assert_eq!(id2.len(), SESSION_ID_LEN);
        assert_ne!(id1, id2);
        assert!(id1.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_strength_accepts_strong_password() {
        assert!(check_strength("CorrectPass1!").is_ok());
    }

    #[test]
    fn test_strength_check_order_is_deterministic() {
        // Short AND missing everything else: length is reported first
        assert_eq!(check_strength("A1!"), Err(StrengthIssue::TooShort));
        // Long enough, no lowercase (also no digit): lowercase reported first
        assert_eq!(check_strength("PASSWORD!!"), Err(StrengthIssue::MissingLowercase));
        assert_eq!(check_strength("password1!"), Err(StrengthIssue::MissingUppercase));
        assert_eq!(check_strength("Password!!"), Err(StrengthIssue::MissingDigit));
        assert_eq!(check_strength("Password11"), Err(StrengthIssue::MissingSymbol));
    }
}
