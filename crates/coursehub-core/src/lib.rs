//! `coursehub` Core Library
//!
//! Shared functionality for `coursehub` components:
//! - `SQLite` pool helpers and the `define_database!` macro
//! - Configuration resolution and hierarchy
//! - Tracing initialisation (and optional `OpenTelemetry` metrics)
//! - Common error types and the caller-facing error taxonomy

pub mod config;
pub mod db;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, ErrorCategory, Result};
