//! `SQLite` storage for the coursehub server.
//!
//! Provides persistence for identities, the catalog (courses and units), the
//! token revocation list, watch facts, enrollments and certificates.

mod db;
mod models;
mod queries;
mod queries_progress;
mod queries_revocations;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_wrap)]
mod tests;

pub use db::{CourseDatabase, DatabaseError};
pub use models::*;
pub use queries::NewUser;
pub use queries_progress::{AppliedProgress, ProgressWrite};
