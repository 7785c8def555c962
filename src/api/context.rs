//! Per-request context: the shared state plus whoever the session cookie names.
//!
//! Handlers receive the context as an explicit extractor instead of reading
//! ambient request state.

use super::{AppConfig, AppState, ApiError};
use crate::{
    auth::hash_session_token,
    storage::SessionRecord,
};
use anyhow::{Context, anyhow};
use axum::{
    extract::FromRequestParts,
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, InvalidHeaderValue},
        request::Parts,
    },
};
use tracing::{debug, error};
use uuid::Uuid;

pub const SESSION_COOKIE_NAME: &str = "learning_log_session";

/// The session a request arrived with.
#[derive(Debug, Clone)]
struct ActiveSession {
    token_hash: Vec<u8>,
    record: SessionRecord,
}

/// Shared state and the (optional) signed-in user for one request.
#[derive(Clone)]
pub struct RequestContext {
    state: AppState,
    session: Option<ActiveSession>,
}

impl RequestContext {
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    #[must_use]
    pub fn user(&self) -> Option<&SessionRecord> {
        self.session.as_ref().map(|session| &session.record)
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.user().map(|user| user.username.as_str())
    }

    /// Hash of the token this request presented, if it named a live session.
    #[must_use]
    pub fn session_token_hash(&self) -> Option<&[u8]> {
        self.session
            .as_ref()
            .map(|session| session.token_hash.as_slice())
    }

    /// Create a session for `user_id` and return the `Set-Cookie` value.
    /// Any session this request already carried is deleted first.
    ///
    /// # Errors
    /// Returns an error if the session cannot be stored or the cookie built.
    pub async fn login(&self, user_id: Uuid) -> Result<HeaderValue, ApiError> {
        if let Some(previous) = self.session_token_hash()
            && let Err(err) = self.state.sessions().delete_session(previous).await
        {
            error!("Failed to delete previous session: {err}");
        }

        let config = self.state.config();
        let token = self
            .state
            .sessions()
            .insert_session(user_id, config.session_ttl_seconds())
            .await
            .context("failed to create session")?;

        session_cookie(config, &token)
            .context("failed to build session cookie")
            .map_err(ApiError::from)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = parts
            .extensions
            .get::<AppState>()
            .cloned()
            .ok_or_else(|| anyhow!("application state is not installed"))?;

        let Some(token) = extract_session_token(&parts.headers) else {
            return Ok(Self {
                state,
                session: None,
            });
        };

        // Only the hash is stored; never compare raw tokens against the store.
        let token_hash = hash_session_token(&token);
        let record = state
            .sessions()
            .lookup_session(&token_hash)
            .await
            .context("failed to lookup session")?;

        if record.is_none() {
            debug!("Session token did not resolve");
        }

        Ok(Self {
            state,
            session: record.map(|record| ActiveSession { token_hash, record }),
        })
    }
}

/// A request that must come from a signed-in user.
///
/// Anonymous requests are rejected with a redirect to the login page that
/// brings the user back afterwards.
#[derive(Clone)]
pub struct LoggedIn {
    pub context: RequestContext,
    pub user: SessionRecord,
}

impl<S> FromRequestParts<S> for LoggedIn
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = RequestContext::from_request_parts(parts, state).await?;
        match context.user().cloned() {
            Some(user) => Ok(Self { context, user }),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
                Err(ApiError::LoginRequired { next })
            }
        }
    }
}

/// Build an `HttpOnly` cookie for the session token.
pub(crate) fn session_cookie(
    config: &AppConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(config: &AppConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            if key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}
