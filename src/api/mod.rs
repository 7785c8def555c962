use crate::{
    forms::PasswordPolicy,
    storage::{LogStore, SessionStore, UserStore},
};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::any,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

mod context;
mod error;
pub(crate) mod handlers;
mod openapi;
mod render;

pub use context::{LoggedIn, RequestContext, SESSION_COOKIE_NAME};
pub use error::ApiError;
pub use openapi::openapi;
pub use render::Page;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 14 * 24 * 60 * 60;

/// Longest accepted session lifetime (ten years).
pub const MAX_SESSION_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Settings the handlers read on every request.
#[derive(Clone, Debug)]
pub struct AppConfig {
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
    password_policy: PasswordPolicy,
}

impl AppConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
            password_policy: PasswordPolicy::new(),
        }
    }

    #[must_use]
    pub const fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = if seconds > MAX_SESSION_TTL_SECONDS {
            MAX_SESSION_TTL_SECONDS
        } else {
            seconds
        };
        self
    }

    #[must_use]
    pub const fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub const fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    #[must_use]
    pub const fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub const fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub const fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration plus the stores, shared by every request.
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    logs: Arc<dyn LogStore>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        logs: Arc<dyn LogStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            users,
            sessions,
            logs,
        }
    }

    /// Use one backend for users, sessions and the log itself.
    #[must_use]
    pub fn with_store<S>(config: AppConfig, store: Arc<S>) -> Self
    where
        S: UserStore + SessionStore + LogStore + 'static,
    {
        Self::new(config, store.clone(), store.clone(), store)
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn logs(&self) -> &dyn LogStore {
        self.logs.as_ref()
    }
}

/// Build the application with every route and middleware layer.
#[must_use]
pub fn router(state: AppState) -> Router {
    // Logout answers any method, which the documented router cannot express.
    let (router, _openapi) = openapi::api_router().split_for_parts();
    router
        .route("/users/logout", any(handlers::account::logout_view))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: AppState) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
pub(crate) mod tests;
