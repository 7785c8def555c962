//! Storage seams for users, sessions, topics and entries.
//!
//! Handlers only see these traits. `postgres::PgStore` backs a real deployment;
//! `memory::MemoryStore` keeps everything in process for local runs and tests.

pub mod memory;
pub mod postgres;

use crate::models::{Entry, NewEntry, NewTopic, Topic, User};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// A user together with the stored password hash.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

/// Outcome when attempting to create a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertUserOutcome {
    Created(User),
    Conflict,
}

/// Minimal data returned for a valid session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub username: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, username: &str, password_hash: &str) -> Result<InsertUserOutcome>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    async fn username_exists(&self, username: &str) -> Result<bool> {
        Ok(self.find_user_by_username(username).await?.is_some())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session for `user_id` and return the raw token for the cookie.
    async fn insert_session(&self, user_id: Uuid, ttl_seconds: i64) -> Result<String>;

    /// Resolve an unexpired session by token hash.
    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>>;

    /// Delete a session; missing sessions are not an error.
    async fn delete_session(&self, token_hash: &[u8]) -> Result<()>;
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert_topic(&self, topic: NewTopic) -> Result<Topic>;

    /// Topics owned by `owner`, oldest first.
    async fn topics_for_owner(&self, owner: Uuid) -> Result<Vec<Topic>>;

    async fn topic(&self, topic_id: Uuid) -> Result<Option<Topic>>;

    async fn insert_entry(&self, entry: NewEntry) -> Result<Entry>;

    /// Entries under `topic_id`, newest first.
    async fn entries_for_topic(&self, topic_id: Uuid) -> Result<Vec<Entry>>;

    async fn entry(&self, entry_id: Uuid) -> Result<Option<Entry>>;

    /// Replace an entry's text; `date_added` is left untouched.
    async fn update_entry_text(&self, entry_id: Uuid, text: &str) -> Result<Option<Entry>>;

    /// Cheap round trip used by `/health`.
    async fn ping(&self) -> Result<()>;
}
