//! Database record structures matching table schemas.

pub mod audit_log;
pub mod login_attempts;
pub mod sessions;
