//! coursehub server library
//!
//! Core functionality of the course marketplace backend:
//! - SQLite storage for identities, the catalog, revocations, watch facts,
//!   enrollments and certificates
//! - JWT issuance, password hashing and the token revocation list
//! - Session service (login, logout, refresh, authenticate)
//! - Enrollment service (progress, completion, certificates)
//! - Best-effort notifications

pub mod auth;
pub mod notifications;
pub mod progress;
pub mod server;
pub mod storage;
