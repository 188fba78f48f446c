//! Persisted refresh token records, one per active session slot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::types::{RefreshTokenId, UserId};

#[derive(Debug, Clone, Serialize, FromRow)]
/// Database representation of a refresh token slot.
///
/// The plaintext token is never stored; `token_hash` is an Argon2id PHC string
/// of the token concatenated with the server pepper.
pub struct RefreshTokenRecord {
    pub id: RefreshTokenId,
    pub user_id: UserId,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(
        user_id: UserId,
        token_hash: String,
        expires_at: DateTime<Utc>,
        user_agent: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RefreshTokenId::new(),
            user_id,
            token_hash,
            expires_at,
            user_agent,
            created_at: now,
            updated_at: now,
        }
    }

    /// A record is active while `expires_at` is still ahead of `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
