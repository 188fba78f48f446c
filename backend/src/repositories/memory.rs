//! Process-local repositories.
//!
//! Both keep a query counter so callers can assert that a code path never
//! touched the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use crate::{
    models::{refresh_token::RefreshTokenRecord, user::User},
    repositories::{refresh_token::RefreshTokenRepository, user::UserRepository},
    types::{RefreshTokenId, UserId},
};

#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    records: Mutex<Vec<RefreshTokenRecord>>,
    queries: AtomicUsize,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Insert a record directly, bypassing the query counter.
    pub fn seed(&self, record: RefreshTokenRecord) {
        self.lock().push(record);
    }

    /// Snapshot of every stored record, expired ones included.
    pub fn records(&self) -> Vec<RefreshTokenRecord> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RefreshTokenRecord>> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn count(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn insert(&self, record: &RefreshTokenRecord) -> anyhow::Result<()> {
        self.count();
        let mut records = self.lock();
        if records.iter().any(|existing| existing.id == record.id) {
            anyhow::bail!("duplicate refresh token id {}", record.id);
        }
        records.push(record.clone());
        Ok(())
    }

    async fn find_active_by_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RefreshTokenRecord>> {
        self.count();
        let mut active: Vec<RefreshTokenRecord> = self
            .lock()
            .iter()
            .filter(|record| record.user_id == user_id && record.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(active)
    }

    async fn rotate(
        &self,
        id: RefreshTokenId,
        expected_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
        user_agent: Option<String>,
    ) -> anyhow::Result<bool> {
        self.count();
        let mut records = self.lock();
        let Some(record) = records
            .iter_mut()
            .find(|record| record.id == id && record.token_hash == expected_hash)
        else {
            return Ok(false);
        };
        record.token_hash = new_hash.to_string();
        record.expires_at = record.expires_at.max(expires_at);
        record.user_agent = user_agent;
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn purge_expired(&self, user_id: UserId, now: DateTime<Utc>) -> anyhow::Result<u64> {
        self.count();
        let mut records = self.lock();
        let before = records.len();
        records.retain(|record| !(record.user_id == user_id && record.expires_at < now));
        Ok((before - records.len()) as u64)
    }

    async fn delete_by_id(&self, id: RefreshTokenId) -> anyhow::Result<u64> {
        self.count();
        let mut records = self.lock();
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok((before - records.len()) as u64)
    }

    async fn delete_for_user(&self, user_id: UserId) -> anyhow::Result<u64> {
        self.count();
        let mut records = self.lock();
        let before = records.len();
        records.retain(|record| record.user_id != user_id);
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
    queries: AtomicUsize,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn seed(&self, user: User) {
        self.lock().push(user);
    }

    /// Removes a user, simulating an account deleted while sessions are live.
    pub fn remove(&self, id: UserId) {
        self.lock().retain(|user| user.id != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<User>> {
        self.users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .lock()
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, user: &User) -> anyhow::Result<()> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut users = self.lock();
        if users
            .iter()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            anyhow::bail!("email already registered");
        }
        users.push(user.clone());
        Ok(())
    }
}
