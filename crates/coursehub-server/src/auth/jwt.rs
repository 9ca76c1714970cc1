//! JWT token issuance and validation.
//!
//! The manager is a pure function of the signing secret, the claims and the
//! `now` supplied by the caller: the library's own wall-clock expiry check is
//! switched off and expiry is decided against `now` here.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};

use coursehub_core::ErrorCategory;

use super::claims::{Claims, Role, TokenKind};

/// Why a token could not be used.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl TokenError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSignature | Self::Expired | Self::Malformed => ErrorCategory::AuthFailure,
            Self::Signing(_) => ErrorCategory::Internal,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed,
        }
    }
}

/// A freshly signed token together with the fields callers need to keep.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: i64,
}

/// Manages JWT token creation and validation.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl JwtManager {
    /// Create a new `JwtManager` with the given secret.
    pub fn new(secret: &[u8], access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub const fn ttl(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        }
    }

    /// Sign a new token of `kind` for the given identity.
    ///
    /// Every call gets a fresh v4 UUID as `jti`, so no two tokens are equal.
    pub fn issue(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
        kind: TokenKind,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            iat: now,
            exp: now + self.ttl(kind),
            token_type: kind,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            jti: claims.jti,
            expires_at: claims.exp,
        })
    }

    /// Issue an access token for the given user.
    pub fn issue_access_token(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, username, role, TokenKind::Access, now)
    }

    /// Issue a refresh token for the given user.
    pub fn issue_refresh_token(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, username, role, TokenKind::Refresh, now)
    }

    /// Validate signature and expiry and return the claims.
    ///
    /// `exp <= now` is `Expired` even when the signature is fine.
    pub fn verify(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let claims = self.inspect(token)?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Validate the signature only; expiry is not checked.
    pub fn inspect(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Hash a token for storage (we don't store raw tokens).
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
