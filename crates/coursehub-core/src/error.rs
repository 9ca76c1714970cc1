//! Error types for `coursehub` core library.

use thiserror::Error;

/// Result type alias using `coursehub` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `coursehub` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller-facing classification shared by every subsystem error.
///
/// Edge layers map a category onto their own status codes; the variant
/// inside the error carries the detail that is safe to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed input rejected before any store access.
    Validation,
    /// Bad credentials or an unusable token.
    AuthFailure,
    /// A referenced user, course, unit or record does not exist.
    NotFound,
    /// Uniqueness or concurrent-update conflict.
    Conflict,
    /// The requested computation is undefined for the stored state.
    StateInvariant,
    /// Storage or signing failure.
    Internal,
}

impl ErrorCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::AuthFailure => "auth_failure",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::StateInvariant => "state_invariant",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
