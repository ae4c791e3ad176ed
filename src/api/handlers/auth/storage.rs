//! Session state behind a storage seam.
//!
//! Raw tokens exist only in transit: `insert` and `rotate` mint the raw value
//! for the cookie, every other method works on the token hash.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row};
use std::future::Future;
use tracing::Instrument;
use uuid::Uuid;

use super::utils::{generate_session_token, hash_session_token, is_unique_violation};

/// Minimal data returned for a valid session cookie.
pub(crate) struct SessionRecord {
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
}

/// Durable session records keyed by token hash.
pub(crate) trait SessionStore: Send + Sync {
    /// Mint a session: generate a random token, store only its hash, and
    /// return the raw value so the caller can set the cookie.
    fn insert(
        &self,
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Resolve an unexpired session hash to its user.
    fn lookup(
        &self,
        token_hash: &[u8],
    ) -> impl Future<Output = Result<Option<SessionRecord>>> + Send;

    /// Remove a session. Idempotent; a missing row is not an error.
    fn delete(&self, token_hash: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Rotate a session: delete the presented one and mint a replacement for
    /// the same user. Returns `None` when the old session is missing or
    /// expired, so a stale cookie cannot be traded for a fresh one.
    fn rotate(
        &self,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}

pub(crate) struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SessionStore for PgSessionStore {
    async fn insert(&self, user_id: Uuid, ttl_seconds: i64) -> Result<String> {
        let query = r"
            INSERT INTO sessions (token_hash, user_id, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        for _ in 0..3 {
            let token = generate_session_token()?;
            let token_hash = hash_session_token(&token);
            let result = sqlx::query(query)
                .bind(token_hash)
                .bind(user_id)
                .bind(ttl_seconds)
                .execute(&self.pool)
                .instrument(span.clone())
                .await;

            match result {
                Ok(_) => return Ok(token),
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => return Err(err).context("failed to insert session"),
            }
        }

        Err(anyhow!("failed to generate unique session token"))
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT users.id, users.email
            FROM sessions
            JOIN users ON users.id = sessions.user_id
            WHERE sessions.token_hash = $1
              AND sessions.expires_at > NOW()
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        Ok(row.map(|row| SessionRecord {
            user_id: row.get("id"),
            email: row.get("email"),
        }))
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<()> {
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn rotate(&self, token_hash: &[u8], ttl_seconds: i64) -> Result<Option<String>> {
        let query = r"
            DELETE FROM sessions
            WHERE token_hash = $1
              AND expires_at > NOW()
            RETURNING user_id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to rotate session")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user_id: Uuid = row.get("user_id");
        let token = self.insert(user_id, ttl_seconds).await?;
        Ok(Some(token))
    }
}
