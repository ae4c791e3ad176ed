//! Postgres-backed collaborator implementations.

use super::{Credential, CredentialStore, KeyValueStore, User, UserStore};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::time::Duration;
use uuid::Uuid;

impl<'r> sqlx::FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for Credential {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            credential_id: row.try_get("credential_id")?,
            user_id: row.try_get("user_id")?,
            public_key: row.try_get("public_key")?,
            sign_count: row.try_get("sign_count")?,
            transports: row.try_get("transports")?,
            created_at: row.try_get("created_at")?,
            last_used_at: row.try_get("last_used_at")?,
        })
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserStore for PgUserStore {
    async fn find_or_create(&self, email: &str) -> Result<(User, bool)> {
        if let Some(user) = self.find_by_email(email).await? {
            return Ok((user, false));
        }

        // Race with a concurrent first login is resolved by the unique email
        // constraint: fall back to the winning row.
        let inserted = sqlx::query_as::<_, User>(
            r"
            INSERT INTO users (email)
            VALUES ($1)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, created_at
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to insert user")?;

        match inserted {
            Some(user) => Ok((user, true)),
            None => {
                let user = self
                    .find_by_email(email)
                    .await?
                    .context("User vanished after conflicting insert")?;
                Ok((user, false))
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, email, created_at FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")
    }
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CredentialStore for PgCredentialStore {
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Credential>> {
        sqlx::query_as::<_, Credential>(
            "SELECT * FROM credentials WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list credentials")
    }

    async fn find_by_credential_id(&self, credential_id: &[u8]) -> Result<Option<Credential>> {
        sqlx::query_as::<_, Credential>("SELECT * FROM credentials WHERE credential_id = $1")
            .bind(credential_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch credential")
    }

    async fn insert(&self, credential: &Credential) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO credentials (credential_id, user_id, public_key, sign_count, transports)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&credential.credential_id)
        .bind(credential.user_id)
        .bind(&credential.public_key)
        .bind(credential.sign_count)
        .bind(&credential.transports)
        .execute(&self.pool)
        .await
        .context("Failed to insert credential")?;
        Ok(())
    }

    async fn update_counter(&self, credential_id: &[u8], sign_count: i64) -> Result<()> {
        // GREATEST keeps the counter monotonic even if two verified
        // assertions race on the update.
        sqlx::query(
            r"
            UPDATE credentials
            SET sign_count = GREATEST(sign_count, $1), last_used_at = NOW()
            WHERE credential_id = $2
            ",
        )
        .bind(sign_count)
        .bind(credential_id)
        .execute(&self.pool)
        .await
        .context("Failed to update credential counter")?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgKv {
    pool: PgPool,
}

impl PgKv {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Drop expired rows. Called opportunistically on writes; correctness
    /// never depends on it because reads filter on `expires_at`.
    async fn purge_expired(&self) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .context("Failed to purge expired kv entries")?;
        Ok(())
    }
}

impl KeyValueStore for PgKv {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.purge_expired().await?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).context("kv ttl out of range")?;
        sqlx::query(
            r"
            INSERT INTO kv_store (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET value = $2, expires_at = $3
            ",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .context("Failed to store kv entry")?;
        Ok(())
    }

    async fn get_and_delete(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // Single statement; the row-level delete decides the winner when two
        // consumers race for the same key.
        let row = sqlx::query(
            "DELETE FROM kv_store WHERE key = $1 AND expires_at > NOW() RETURNING value",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to consume kv entry")?;
        row.map(|row| row.try_get("value").context("kv row missing value"))
            .transpose()
    }

    async fn consume_if_eq(&self, key: &str, expected: &[u8]) -> Result<bool> {
        // Comparison and delete happen in one statement, so two confirms
        // racing on the same key cannot both win.
        let row = sqlx::query(
            r"
            DELETE FROM kv_store
            WHERE key = $1 AND value = $2 AND expires_at > NOW()
            RETURNING value
            ",
        )
        .bind(key)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to consume kv entry")?;
        Ok(row.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row =
            sqlx::query("SELECT value FROM kv_store WHERE key = $1 AND expires_at > NOW()")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch kv entry")?;
        row.map(|row| row.try_get("value").context("kv row missing value"))
            .transpose()
    }
}
