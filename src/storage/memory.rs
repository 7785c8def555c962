//! In-process store. Data lives as long as the process does.

use super::{InsertUserOutcome, LogStore, SessionRecord, SessionStore, UserRecord, UserStore};
use crate::{
    auth::{generate_session_token, hash_session_token},
    models::{Entry, NewEntry, NewTopic, Topic, User},
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredSession {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    sessions: HashMap<Vec<u8>, StoredSession>,
    topics: Vec<Topic>,
    entries: Vec<Entry>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }

    /// Number of stored sessions. Expired ones linger until looked up or
    /// until the next session is created.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, username: &str, password_hash: &str) -> Result<InsertUserOutcome> {
        let mut inner = self.inner.write().await;
        if inner
            .users
            .values()
            .any(|record| record.user.username == username)
        {
            return Ok(InsertUserOutcome::Conflict);
        }

        let user = User {
            id: Uuid::now_v7(),
            username: username.to_string(),
            date_joined: Utc::now(),
        };
        inner.users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(InsertUserOutcome::Created(user))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|record| record.user.username == username)
            .cloned())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, user_id: Uuid, ttl_seconds: i64) -> Result<String> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user_id) {
            return Err(anyhow!("cannot create session for unknown user {user_id}"));
        }

        let now = Utc::now();
        let expires_at = TimeDelta::try_seconds(ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| anyhow!("session ttl out of range: {ttl_seconds}s"))?;

        inner.sessions.retain(|_, session| session.expires_at > now);
        for _ in 0..3 {
            let token = generate_session_token()?;
            let token_hash = hash_session_token(&token);
            if inner.sessions.contains_key(&token_hash) {
                continue;
            }
            inner.sessions.insert(
                token_hash,
                StoredSession {
                    user_id,
                    expires_at,
                },
            );
            return Ok(token);
        }

        Err(anyhow!("failed to generate unique session token"))
    }

    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.get(token_hash) else {
            return Ok(None);
        };
        if session.expires_at <= Utc::now() {
            inner.sessions.remove(token_hash);
            return Ok(None);
        }
        Ok(inner.users.get(&session.user_id).map(|record| SessionRecord {
            user_id: record.user.id,
            username: record.user.username.clone(),
        }))
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        self.inner.write().await.sessions.remove(token_hash);
        Ok(())
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert_topic(&self, topic: NewTopic) -> Result<Topic> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&topic.owner) {
            return Err(anyhow!("topic owner {} does not exist", topic.owner));
        }
        let topic = Topic {
            id: Uuid::now_v7(),
            text: topic.text,
            date_added: Utc::now(),
            owner: topic.owner,
        };
        inner.topics.push(topic.clone());
        Ok(topic)
    }

    async fn topics_for_owner(&self, owner: Uuid) -> Result<Vec<Topic>> {
        let inner = self.inner.read().await;
        let mut topics: Vec<Topic> = inner
            .topics
            .iter()
            .filter(|topic| topic.owner == owner)
            .cloned()
            .collect();
        topics.sort_by_key(|topic| topic.date_added);
        Ok(topics)
    }

    async fn topic(&self, topic_id: Uuid) -> Result<Option<Topic>> {
        let inner = self.inner.read().await;
        Ok(inner.topics.iter().find(|topic| topic.id == topic_id).cloned())
    }

    async fn insert_entry(&self, entry: NewEntry) -> Result<Entry> {
        let mut inner = self.inner.write().await;
        if !inner.topics.iter().any(|topic| topic.id == entry.topic) {
            return Err(anyhow!("topic {} does not exist", entry.topic));
        }
        let entry = Entry {
            id: Uuid::now_v7(),
            topic: entry.topic,
            text: entry.text,
            date_added: Utc::now(),
        };
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    async fn entries_for_topic(&self, topic_id: Uuid) -> Result<Vec<Entry>> {
        let inner = self.inner.read().await;
        // Insertion order breaks ties between entries added within the same instant.
        Ok(inner
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.topic == topic_id)
            .cloned()
            .collect())
    }

    async fn entry(&self, entry_id: Uuid) -> Result<Option<Entry>> {
        let inner = self.inner.read().await;
        Ok(inner.entries.iter().find(|entry| entry.id == entry_id).cloned())
    }

    async fn update_entry_text(&self, entry_id: Uuid, text: &str) -> Result<Option<Entry>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .entries
            .iter_mut()
            .find(|entry| entry.id == entry_id)
            .map(|entry| {
                entry.text = text.to_string();
                entry.clone()
            }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
