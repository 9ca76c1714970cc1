//! Durable denylist of revoked token ids.

use tracing::{debug, error, info};

use crate::storage::{CourseDatabase, DatabaseError};

use super::jwt::JwtManager;

/// Revocation list backed by the `revoked_tokens` table.
///
/// Reads and writes go to the same database, so a `revoke` is visible to the
/// very next `is_revoked`.
#[derive(Clone)]
pub struct RevocationStore {
    db: CourseDatabase,
}

impl RevocationStore {
    pub const fn new(db: CourseDatabase) -> Self {
        Self { db }
    }

    /// Revoke a token by id. Revoking an already-revoked id is a no-op.
    ///
    /// Only a SHA-256 fingerprint of `raw_token` is persisted. Returns `true`
    /// for the call that added the record.
    pub async fn revoke(
        &self,
        token_id: &str,
        raw_token: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let token_hash = JwtManager::hash_token(raw_token);
        let inserted = self
            .db
            .insert_revoked_token(token_id, &token_hash, expires_at, now)
            .await?;

        if inserted {
            info!(token_id, expires_at, "Token revoked");
            #[cfg(feature = "metrics")]
            coursehub_core::metrics::record_revocation();
        } else {
            debug!(token_id, "Token already revoked");
        }
        Ok(inserted)
    }

    /// Whether the token id is on the denylist.
    ///
    /// Fails closed: if the store cannot answer, the token is treated as
    /// revoked.
    pub async fn is_revoked(&self, token_id: &str) -> bool {
        match self.db.is_token_revoked(token_id).await {
            Ok(revoked) => revoked,
            Err(e) => {
                error!(token_id, error = %e, "Revocation lookup failed; denying token");
                true
            }
        }
    }

    /// Drop records for tokens that have expired by `now`.
    pub async fn prune_expired(&self, now: i64) -> Result<u64, DatabaseError> {
        let removed = self.db.prune_revoked_tokens(now).await?;
        if removed > 0 {
            info!(removed, "Pruned expired revocation records");
        }
        Ok(removed)
    }
}
