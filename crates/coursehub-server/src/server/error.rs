//! Error types returned by the session and enrollment services.
//!
//! Every variant maps onto an [`ErrorCategory`]; messages never say which
//! credential check failed.

use coursehub_core::ErrorCategory;

use crate::auth::TokenError;
use crate::storage::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token must not be blank")]
    Blank,

    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("invalid credentials")]
    BadCredentials,

    #[error("username already taken")]
    UsernameTaken,

    /// Expired, revoked, wrongly signed or of the wrong kind.
    #[error("token expired or revoked")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("user not found")]
    UserNotFound,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl AuthError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Blank | Self::InvalidRegistration(_) => ErrorCategory::Validation,
            Self::BadCredentials | Self::Expired | Self::Malformed => ErrorCategory::AuthFailure,
            Self::UsernameTaken => ErrorCategory::Conflict,
            Self::UserNotFound => ErrorCategory::NotFound,
            Self::PasswordHash(_) => ErrorCategory::Internal,
            Self::Token(e) => e.category(),
            Self::Storage(e) => e.category(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("already enrolled in this course")]
    AlreadyEnrolled,

    #[error("course not found")]
    CourseNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("unit not found")]
    UnitNotFound,

    #[error("not enrolled in this course")]
    NotEnrolled,

    #[error("course has no units")]
    NoUnits,

    /// The database stayed locked by concurrent writers past its timeouts.
    #[error("progress update timed out waiting for concurrent writers")]
    Contention,

    #[error("certificate not found")]
    CertificateNotFound,

    #[error(transparent)]
    Storage(DatabaseError),
}

impl From<DatabaseError> for EnrollmentError {
    fn from(e: DatabaseError) -> Self {
        if e.is_busy() {
            Self::Contention
        } else {
            Self::Storage(e)
        }
    }
}

impl EnrollmentError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadyEnrolled | Self::Contention => ErrorCategory::Conflict,
            Self::CourseNotFound
            | Self::UserNotFound
            | Self::UnitNotFound
            | Self::NotEnrolled
            | Self::CertificateNotFound => ErrorCategory::NotFound,
            Self::NoUnits => ErrorCategory::StateInvariant,
            Self::Storage(e) => e.category(),
        }
    }
}
