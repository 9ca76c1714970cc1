//! Session and enrollment services.
//!
//! These are the entry points an edge layer (HTTP, CLI) calls. Each
//! operation takes the acting identity and `now` explicitly.

pub mod enrollment_svc;
pub mod error;
pub mod interceptor;
pub mod session_svc;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test_helpers;


pub use enrollment_svc::EnrollmentService;
pub use error::{AuthError, EnrollmentError};
pub use interceptor::{authenticate_header, bearer_token};
pub use session_svc::{RefreshedTokens, SessionService, TokenPair};
