//! Postgres-backed store. Schema lives in `sql/schema.sql`.

use super::{InsertUserOutcome, LogStore, SessionRecord, SessionStore, UserRecord, UserStore};
use crate::{
    auth::{generate_session_token, hash_session_token},
    models::{Entry, NewEntry, NewTopic, Topic, User},
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row, postgres::PgRow};
use tracing::{Instrument, Span, info_span};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        date_joined: row.get("date_joined"),
    }
}

fn topic_from_row(row: &PgRow) -> Topic {
    Topic {
        id: row.get("id"),
        text: row.get("text"),
        date_added: row.get("date_added"),
        owner: row.get("owner_id"),
    }
}

fn entry_from_row(row: &PgRow) -> Entry {
    Entry {
        id: row.get("id"),
        topic: row.get("topic_id"),
        text: row.get("text"),
        date_added: row.get("date_added"),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, username: &str, password_hash: &str) -> Result<InsertUserOutcome> {
        let query = r"
            INSERT INTO users (id, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, date_joined
        ";
        let row = sqlx::query(query)
            .bind(Uuid::now_v7())
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match row {
            Ok(row) => Ok(InsertUserOutcome::Created(user_from_row(&row))),
            Err(err) if is_unique_violation(&err) => Ok(InsertUserOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let query =
            "SELECT id, username, date_joined, password_hash FROM users WHERE username = $1";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup user")?;

        Ok(row.map(|row| UserRecord {
            user: user_from_row(&row),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1) AS exists";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to check if user exists")?;
        Ok(row.get("exists"))
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&self, user_id: Uuid, ttl_seconds: i64) -> Result<String> {
        // Store only the hash; the raw token goes back to the caller for the cookie.
        let query = r"
            INSERT INTO user_sessions (session_hash, user_id, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ";
        let span = query_span("INSERT", query);

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

    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT users.id, users.username
            FROM user_sessions
            JOIN users ON users.id = user_sessions.user_id
            WHERE user_sessions.session_hash = $1
              AND user_sessions.expires_at > NOW()
            LIMIT 1
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup session")?;

        Ok(row.map(|row| SessionRecord {
            user_id: row.get("id"),
            username: row.get("username"),
        }))
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}

#[async_trait]
impl LogStore for PgStore {
    async fn insert_topic(&self, topic: NewTopic) -> Result<Topic> {
        let query = r"
            INSERT INTO topics (id, text, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, text, date_added, owner_id
        ";
        let row = sqlx::query(query)
            .bind(Uuid::now_v7())
            .bind(&topic.text)
            .bind(topic.owner)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert topic")?;
        Ok(topic_from_row(&row))
    }

    async fn topics_for_owner(&self, owner: Uuid) -> Result<Vec<Topic>> {
        let query = r"
            SELECT id, text, date_added, owner_id
            FROM topics
            WHERE owner_id = $1
            ORDER BY date_added, id
        ";
        let rows = sqlx::query(query)
            .bind(owner)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to list topics")?;
        Ok(rows.iter().map(topic_from_row).collect())
    }

    async fn topic(&self, topic_id: Uuid) -> Result<Option<Topic>> {
        let query = "SELECT id, text, date_added, owner_id FROM topics WHERE id = $1";
        let row = sqlx::query(query)
            .bind(topic_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup topic")?;
        Ok(row.as_ref().map(topic_from_row))
    }

    async fn insert_entry(&self, entry: NewEntry) -> Result<Entry> {
        let query = r"
            INSERT INTO entries (id, topic_id, text)
            VALUES ($1, $2, $3)
            RETURNING id, topic_id, text, date_added
        ";
        let row = sqlx::query(query)
            .bind(Uuid::now_v7())
            .bind(entry.topic)
            .bind(&entry.text)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert entry")?;
        Ok(entry_from_row(&row))
    }

    async fn entries_for_topic(&self, topic_id: Uuid) -> Result<Vec<Entry>> {
        let query = r"
            SELECT id, topic_id, text, date_added
            FROM entries
            WHERE topic_id = $1
            ORDER BY date_added DESC, id DESC
        ";
        let rows = sqlx::query(query)
            .bind(topic_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to list entries")?;
        Ok(rows.iter().map(entry_from_row).collect())
    }

    async fn entry(&self, entry_id: Uuid) -> Result<Option<Entry>> {
        let query = "SELECT id, topic_id, text, date_added FROM entries WHERE id = $1";
        let row = sqlx::query(query)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup entry")?;
        Ok(row.as_ref().map(entry_from_row))
    }

    async fn update_entry_text(&self, entry_id: Uuid, text: &str) -> Result<Option<Entry>> {
        let query = r"
            UPDATE entries
            SET text = $2
            WHERE id = $1
            RETURNING id, topic_id, text, date_added
        ";
        let row = sqlx::query(query)
            .bind(entry_id)
            .bind(text)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update entry")?;
        Ok(row.as_ref().map(entry_from_row))
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")
    }
}
