//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx over SQLite.
//! It follows the repository pattern: API handlers talk to repositories
//! ([`handlers`]), repositories return record structs ([`models`]), and
//! faults are categorized by [`errors::DbError`].
//!
//! All durable authentication state lives here: session rows, per-origin
//! login attempt counters, and the append-only audit log. The admin
//! credential record itself is file-backed (see [`crate::credentials`]).

pub mod errors;
pub mod handlers;
pub mod models;
pub mod pools;
