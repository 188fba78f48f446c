//! Refresh token persistence.
//!
//! Rows hold only the Argon2 hash of a refresh token. All mutation goes through
//! this trait; the hashing layer lives in `services::refresh_token_store`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    models::refresh_token::RefreshTokenRecord,
    types::{RefreshTokenId, UserId},
};

/// Repository trait for refresh token records.
///
/// Use `MockRefreshTokenRepository` in unit tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Insert a new session slot.
    async fn insert(&self, record: &RefreshTokenRecord) -> anyhow::Result<()>;

    /// All records for `user_id` whose `expires_at` is after `now`.
    async fn find_active_by_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RefreshTokenRecord>>;

    /// Replace the hash of record `id` in place, but only while it still holds
    /// `expected_hash`. Returns `false` when another rotation got there first.
    /// `expires_at` never moves backwards.
    async fn rotate(
        &self,
        id: RefreshTokenId,
        expected_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
        user_agent: Option<String>,
    ) -> anyhow::Result<bool>;

    /// Delete records for `user_id` with `expires_at < now`.
    async fn purge_expired(&self, user_id: UserId, now: DateTime<Utc>) -> anyhow::Result<u64>;

    async fn delete_by_id(&self, id: RefreshTokenId) -> anyhow::Result<u64>;

    async fn delete_for_user(&self, user_id: UserId) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn insert(&self, record: &RefreshTokenRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, user_agent, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .bind(&record.user_agent)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_active_by_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RefreshTokenRecord>> {
        let rows = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT id, user_id, token_hash, expires_at, user_agent, created_at, updated_at \
             FROM refresh_tokens WHERE user_id = $1 AND expires_at > $2 \
             ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn rotate(
        &self,
        id: RefreshTokenId,
        expected_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
        user_agent: Option<String>,
    ) -> anyhow::Result<bool> {
        // The hash predicate makes the match-then-rotate pair a compare-and-swap
        // on the row; Postgres holds the row lock for the duration of the UPDATE.
        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET token_hash = $1, expires_at = GREATEST(expires_at, $2), user_agent = $3, updated_at = NOW() \
             WHERE id = $4 AND token_hash = $5",
        )
        .bind(new_hash)
        .bind(expires_at)
        .bind(user_agent)
        .bind(id)
        .bind(expected_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired(&self, user_id: UserId, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND expires_at < $2")
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_id(&self, id: RefreshTokenId) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_for_user(&self, user_id: UserId) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
