//! Revocation-list queries.
//!
//! A row here invalidates the token with that `jti` regardless of its own
//! expiry. Rows are only ever removed by [`CourseDatabase::prune_revoked_tokens`]
//! after the token has expired on its own.

use super::db::{CourseDatabase, DatabaseError};
use super::models::RevokedToken;

impl CourseDatabase {
    /// Record a revoked token. Returns `false` if the id was already present.
    pub async fn insert_revoked_token(
        &self,
        token_id: &str,
        token_hash: &str,
        expires_at: i64,
        revoked_at: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO revoked_tokens (token_id, token_hash, expires_at, revoked_at) VALUES (?, ?, ?, ?) ON CONFLICT (token_id) DO NOTHING",
        )
        .bind(token_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(revoked_at)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_token_revoked(&self, token_id: &str) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM revoked_tokens WHERE token_id = ?")
            .bind(token_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.is_some())
    }

    pub async fn get_revoked_token(
        &self,
        token_id: &str,
    ) -> Result<Option<RevokedToken>, DatabaseError> {
        let token =
            sqlx::query_as::<_, RevokedToken>("SELECT * FROM revoked_tokens WHERE token_id = ?")
                .bind(token_id)
                .fetch_optional(self.pool())
                .await?;

        Ok(token)
    }

    /// Delete revocation records whose token has expired by `now`.
    pub async fn prune_revoked_tokens(&self, now: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
