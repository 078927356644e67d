//! HTTP API layer: request handlers and wire-format models.

pub mod handlers;
pub mod models;
