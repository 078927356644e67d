//! Stateless time-based one-time-code verification.
//!
//! Standard 30-second-step, 6-digit codes with one step of skew tolerance
//! for clock drift. Lockout bookkeeping lives in [`crate::auth::lockout`],
//! not here.

use totp_rs::{Algorithm, Secret, TOTP};

use crate::errors::Error;

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP_SECONDS: u64 = 30;

fn instance(seed: &str, issuer: &str, account: &str) -> Option<TOTP> {
    let secret = Secret::Encoded(seed.to_string()).to_bytes().ok()?;
    Some(TOTP::new_unchecked(
        Algorithm::SHA1,
        DIGITS,
        SKEW,
        STEP_SECONDS,
        secret,
        Some(issuer.to_string()),
        account.to_string(),
    ))
}

/// Check a submitted code against a base32 seed for the current time step
/// (within the skew window). An undecodable seed never validates.
pub fn validate(code: &str, seed: &str) -> bool {
    match instance(seed, "", "") {
        Some(totp) => totp.check_current(code).unwrap_or(false),
        None => false,
    }
}

/// Build the otpauth:// provisioning URI handed out during enrollment.
pub fn provisioning_url(issuer: &str, account: &str, seed: &str) -> Result<String, Error> {
    let totp = instance(seed, issuer, account).ok_or_else(|| Error::Config {
        message: "stored second-factor seed is not valid base32".to_string(),
    })?;

    Ok(totp.get_url())
}

/// The code for the current time step; used by enrollment UIs and tests.
pub fn current_code(seed: &str) -> Option<String> {
    instance(seed, "", "")?.generate_current().ok()
}
