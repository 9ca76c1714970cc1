//! Session service: credential checks, token pairs, logout and refresh.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::auth::{Claims, JwtManager, RevocationStore, Role, TokenError, TokenKind, password};
use crate::notifications::{Notification, NotificationKind, Notifier};
use crate::storage::{CourseDatabase, NewUser, User};

use super::error::AuthError;

/// Access and refresh token issued together at login or registration.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub user_id: String,
    pub access_token: String,
    pub access_expires_at: i64,
    pub refresh_token: String,
    pub refresh_expires_at: i64,
}

/// Result of a refresh. `refresh_token` is only set when rotation is on.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub access_expires_at: i64,
    pub refresh_token: Option<String>,
    pub refresh_expires_at: Option<i64>,
}

pub struct SessionService {
    db: CourseDatabase,
    jwt: Arc<JwtManager>,
    revocations: RevocationStore,
    notifier: Arc<dyn Notifier>,
    rotate_refresh_tokens: bool,
}

impl SessionService {
    pub fn new(db: CourseDatabase, jwt: Arc<JwtManager>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            revocations: RevocationStore::new(db.clone()),
            db,
            jwt,
            notifier,
            rotate_refresh_tokens: false,
        }
    }

    /// Revoke the presented refresh token on every refresh and hand out a
    /// new one.
    #[must_use]
    pub const fn with_refresh_rotation(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }

    pub const fn revocations(&self) -> &RevocationStore {
        &self.revocations
    }

    /// Create an account and log it in.
    #[instrument(skip(self, email, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
        now: i64,
    ) -> Result<TokenPair, AuthError> {
        let username = username.trim();
        if username.chars().count() < 3 {
            return Err(AuthError::InvalidRegistration(
                "username must be at least 3 characters".into(),
            ));
        }
        if password.chars().count() < password::MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidRegistration(format!(
                "password must be at least {} characters",
                password::MIN_PASSWORD_LEN
            )));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidRegistration("email address is invalid".into()));
        }

        let hash =
            password::hash_password(password).map_err(|e| AuthError::PasswordHash(e.to_string()))?;

        let user_id = uuid::Uuid::new_v4().to_string();
        let user = self
            .db
            .create_user(&NewUser {
                id: &user_id,
                username,
                email,
                password_hash: &hash,
                role: role.as_str(),
            })
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    AuthError::UsernameTaken
                } else {
                    AuthError::Storage(e)
                }
            })?;

        info!(user_id = %user.id, "User registered");
        self.send(
            Notification::new(NotificationKind::Welcome, &user.email)
                .with("username", &user.username),
        );

        Ok(self.issue_pair(&user, now)?)
    }

    /// Check credentials and issue a token pair.
    ///
    /// Unknown, disabled and wrong-password cases are indistinguishable to
    /// the caller.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        now: i64,
    ) -> Result<TokenPair, AuthError> {
        // Unknown and disabled accounts still pay for one argon2 run.
        let found = self.db.find_enabled_user_by_username(username).await?;
        let matches = password::password_matches_account(
            password,
            found.as_ref().map(|u| u.password_hash.as_str()),
        );

        let Some(user) = found.filter(|_| matches) else {
            warn!("Failed login attempt");
            record_login("rejected");
            return Err(AuthError::BadCredentials);
        };

        let pair = self.issue_pair(&user, now)?;
        info!(user_id = %user.id, "User logged in");
        record_login("success");
        Ok(pair)
    }

    /// Revoke the presented token, access or refresh.
    ///
    /// Expiry is ignored so an expired token can still be logged out. Logging
    /// out twice succeeds.
    #[instrument(skip(self, raw_token))]
    pub async fn logout(&self, raw_token: &str, now: i64) -> Result<(), AuthError> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return Err(AuthError::Malformed);
        }

        let claims = self.jwt.inspect(raw_token).map_err(|e| {
            debug!(error = %e, "Logout with undecodable token");
            AuthError::Malformed
        })?;

        self.revocations
            .revoke(&claims.jti, raw_token, claims.exp, now)
            .await?;
        info!(user_id = %claims.sub, kind = claims.token_type.as_str(), "Logged out");
        Ok(())
    }

    /// Exchange a refresh token for a new access token.
    #[instrument(skip(self, raw_refresh_token))]
    pub async fn refresh(
        &self,
        raw_refresh_token: &str,
        now: i64,
    ) -> Result<RefreshedTokens, AuthError> {
        let raw_refresh_token = raw_refresh_token.trim();
        if raw_refresh_token.is_empty() {
            return Err(AuthError::Blank);
        }

        let claims = self.usable_token(raw_refresh_token, TokenKind::Refresh, now).await?;

        let Some(user) = self.db.find_enabled_user_by_id(&claims.sub).await? else {
            warn!(user_id = %claims.sub, "Refresh for unknown or disabled user");
            return Err(AuthError::UserNotFound);
        };
        let role = role_of(&user);

        if !self.rotate_refresh_tokens {
            let access = self
                .jwt
                .issue_access_token(&user.id, &user.username, role, now)?;
            debug!(user_id = %user.id, "Access token refreshed");
            return Ok(RefreshedTokens {
                access_token: access.token,
                access_expires_at: access.expires_at,
                refresh_token: None,
                refresh_expires_at: None,
            });
        }

        // Only the caller that revokes the old token gets a new pair.
        let won = self
            .revocations
            .revoke(&claims.jti, raw_refresh_token, claims.exp, now)
            .await?;
        if !won {
            debug!(user_id = %user.id, "Refresh token already rotated");
            return Err(AuthError::Expired);
        }

        let pair = self.issue_pair(&user, now)?;
        debug!(user_id = %user.id, "Token pair rotated");
        Ok(RefreshedTokens {
            access_token: pair.access_token,
            access_expires_at: pair.access_expires_at,
            refresh_token: Some(pair.refresh_token),
            refresh_expires_at: Some(pair.refresh_expires_at),
        })
    }

    /// Resolve a bearer access token to its claims.
    #[instrument(skip(self, raw_access_token))]
    pub async fn authenticate(&self, raw_access_token: &str, now: i64) -> Result<Claims, AuthError> {
        let raw_access_token = raw_access_token.trim();
        if raw_access_token.is_empty() {
            return Err(AuthError::Blank);
        }
        self.usable_token(raw_access_token, TokenKind::Access, now).await
    }

    /// Disable an account. Its existing tokens stop refreshing; new logins
    /// are refused.
    #[instrument(skip(self))]
    pub async fn disable_user(&self, user_id: &str, now: i64) -> Result<(), AuthError> {
        if !self.db.set_user_enabled(user_id, false).await? {
            return Err(AuthError::UserNotFound);
        }
        info!(user_id, disabled_at = now, "User disabled");
        Ok(())
    }

    /// Verify signature, expiry, kind and revocation. Every failure is
    /// reported as `Expired`.
    async fn usable_token(
        &self,
        raw: &str,
        kind: TokenKind,
        now: i64,
    ) -> Result<Claims, AuthError> {
        let claims = self.jwt.verify(raw, now).map_err(|e| {
            debug!(error = %e, "Token rejected");
            AuthError::Expired
        })?;

        if claims.token_type != kind {
            debug!(expected = kind.as_str(), "Token of the wrong kind");
            return Err(AuthError::Expired);
        }

        if self.revocations.is_revoked(&claims.jti).await {
            debug!(jti = %claims.jti, "Token is revoked");
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    fn issue_pair(&self, user: &User, now: i64) -> Result<TokenPair, TokenError> {
        let role = role_of(user);
        let access = self
            .jwt
            .issue_access_token(&user.id, &user.username, role, now)?;
        let refresh = self
            .jwt
            .issue_refresh_token(&user.id, &user.username, role, now)?;

        Ok(TokenPair {
            user_id: user.id.clone(),
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    fn send(&self, notification: Notification) {
        let kind = notification.kind.as_str();
        if let Err(e) = self.notifier.notify(notification) {
            warn!(kind, error = %e, "Notification not delivered");
        }
    }
}

/// The stored role, falling back to the least privileged one.
fn role_of(user: &User) -> Role {
    user.role.parse::<Role>().unwrap_or_else(|e: String| {
        warn!(user_id = %user.id, error = %e, "Stored role is unreadable");
        Role::Member
    })
}

#[allow(clippy::missing_const_for_fn, unused_variables)]
fn record_login(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    coursehub_core::metrics::record_login(outcome);
}
