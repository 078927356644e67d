//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection, provides strongly-typed
//! operations for one table, handles query construction and parameter
//! binding, and returns domain models from [`crate::db::models`].

pub mod audit_log;
pub mod sessions;

pub use audit_log::AuditLog;
pub use sessions::Sessions;
