//! Revoked refresh token storage.
//!
//! Tokens are stateless, so logout records the refresh token's `jti` here and
//! the refresh endpoint refuses any token listed. Entries only need to live
//! until the token would have expired on its own.

use sqlx::sqlite::SqlitePool;

/// Store for revoked refresh tokens.
pub struct RevokedTokenStore {
    pool: SqlitePool,
}

impl RevokedTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a token as revoked. Revoking twice is a no-op.
    /// An expiry that does not fit the column is an encode error.
    pub async fn revoke(&self, jti: &str, email: &str, expires_at: u64) -> Result<(), sqlx::Error> {
        let expires_at = i64::try_from(expires_at).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query("INSERT OR IGNORE INTO revoked_tokens (jti, email, expires_at) VALUES (?, ?, ?)")
            .bind(jti)
            .bind(email)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Check whether a token has been revoked.
    pub async fn is_revoked(&self, jti: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM revoked_tokens WHERE jti = ?")
            .bind(jti)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Delete records whose token has expired by `now` (Unix seconds).
    pub async fn delete_expired(&self, now: u64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?")
            .bind(i64::try_from(now).unwrap_or(i64::MAX))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
