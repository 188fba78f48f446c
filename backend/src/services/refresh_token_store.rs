use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::{
    models::refresh_token::RefreshTokenRecord,
    repositories::refresh_token::RefreshTokenRepository,
    types::{RefreshTokenId, UserId},
    utils::password::{hash_password_async, verify_password_async},
};

/// Hashing layer over [`RefreshTokenRepository`].
///
/// Plaintext refresh tokens never reach the repository; every comparison is an
/// Argon2 verify on the blocking pool.
#[derive(Clone)]
pub struct RefreshTokenStore {
    repo: Arc<dyn RefreshTokenRepository>,
    pepper: String,
    max_ttl: Duration,
}

impl RefreshTokenStore {
    pub fn new(repo: Arc<dyn RefreshTokenRepository>, pepper: String, max_ttl: Duration) -> Self {
        Self {
            repo,
            pepper,
            max_ttl,
        }
    }

    /// Opens a new session slot for `token`.
    pub async fn create(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
        user_agent: Option<String>,
    ) -> anyhow::Result<RefreshTokenRecord> {
        let token_hash = hash_password_async(token.to_string(), self.pepper.clone()).await?;
        let record = RefreshTokenRecord::new(
            user_id,
            token_hash,
            self.clamp_expiry(expires_at, Utc::now()),
            user_agent,
        );
        self.repo.insert(&record).await?;
        Ok(record)
    }

    pub async fn find_active_by_user(
        &self,
        user_id: UserId,
    ) -> anyhow::Result<Vec<RefreshTokenRecord>> {
        self.repo.find_active_by_user(user_id, Utc::now()).await
    }

    /// Returns the first candidate whose hash matches `token`.
    ///
    /// Records whose stored hash cannot be parsed are skipped.
    pub async fn match_by_plaintext(
        &self,
        candidates: Vec<RefreshTokenRecord>,
        token: &str,
    ) -> Option<RefreshTokenRecord> {
        for record in candidates {
            match verify_password_async(
                token.to_string(),
                record.token_hash.clone(),
                self.pepper.clone(),
            )
            .await
            {
                Ok(true) => return Some(record),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        record_id = %record.id,
                        user_id = %record.user_id,
                        error = %err,
                        "Skipping refresh token record with unreadable hash"
                    );
                }
            }
        }
        None
    }

    /// Replaces the hash of `record` with the hash of `new_token`, keeping the id.
    ///
    /// Returns `false` when the row no longer holds the hash `record` was read
    /// with, i.e. a concurrent refresh rotated it first.
    pub async fn rotate(
        &self,
        record: &RefreshTokenRecord,
        new_token: &str,
        new_expiry: DateTime<Utc>,
        user_agent: Option<String>,
    ) -> anyhow::Result<bool> {
        let new_hash = hash_password_async(new_token.to_string(), self.pepper.clone()).await?;
        let expires_at = self.clamp_expiry(new_expiry, Utc::now());
        self.repo
            .rotate(
                record.id,
                &record.token_hash,
                &new_hash,
                expires_at,
                user_agent,
            )
            .await
    }

    pub async fn purge_expired(&self, user_id: UserId) -> anyhow::Result<u64> {
        self.repo.purge_expired(user_id, Utc::now()).await
    }

    pub async fn revoke(&self, record_id: RefreshTokenId) -> anyhow::Result<u64> {
        self.repo.delete_by_id(record_id).await
    }

    pub async fn revoke_all(&self, user_id: UserId) -> anyhow::Result<u64> {
        self.repo.delete_for_user(user_id).await
    }

    fn clamp_expiry(&self, requested: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        requested.min(now + self.max_ttl)
    }
}
