//! Authentication module for coursehub.
//!
//! Provides JWT token management, password hashing and the token
//! revocation list.

pub mod claims;
pub mod jwt;
pub mod password;
pub mod revocation;

pub use claims::{Claims, Role, TokenKind};
pub use jwt::{IssuedToken, JwtManager, TokenError};
pub use revocation::RevocationStore;
