//! Password hashing and verification using argon2id.
//!
//! Stored hashes are PHC strings, so the salt and parameters travel with
//! the hash and can be tuned later without a schema change.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tracing::warn;

/// Minimum accepted length for a new password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A well-formed argon2id hash with the default parameters that no password
/// is expected to match. Verified against when there is no stored hash, so
/// a missing account costs the same as a wrong password.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$AAECAwQFBgcICQoLDA0ODw$AwoRGB8mLTQ7QklQV15lbHN6gYiPlp2kq7K5wMfO1dw";

/// Hash a password using argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Like [`verify_password`], but a stored hash that cannot be parsed counts
/// as a mismatch. Login must not distinguish that case from a wrong password.
pub fn password_matches(password: &str, hash: &str) -> bool {
    verify_password(password, hash).unwrap_or_else(|e| {
        warn!(error = %e, "Stored password hash is unreadable");
        false
    })
}

/// [`password_matches`] for an account that may not exist. Without a stored
/// hash the password is still run through argon2 and never matches.
pub fn password_matches_account(password: &str, hash: Option<&str>) -> bool {
    match hash {
        Some(hash) => password_matches(password, hash),
        None => {
            let _ = verify_password(password, DUMMY_HASH);
            false
        }
    }
}
