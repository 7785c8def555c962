//! Router tests: drive the full app with `oneshot` against the in-memory store.

use super::{AppConfig, AppState, MAX_SESSION_TTL_SECONDS, Page, SESSION_COOKIE_NAME, router};
use crate::{
    forms::{
        NULL_CHARACTER_MESSAGE, REQUIRED_MESSAGE,
        registration::{PASSWORD_MISMATCH_MESSAGE, USERNAME_TAKEN_MESSAGE},
    },
    storage::{InsertUserOutcome, UserRecord, UserStore, memory::MemoryStore},
};
use async_trait::async_trait;
use anyhow::{Context, Result, anyhow};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const PASSWORD: &str = "correct horse battery";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(AppConfig::new())
    }

    fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_store(config, store.clone());
        Self {
            router: router(state),
            store,
        }
    }

    async fn send(&self, request: Request<Body>) -> Result<Response> {
        Ok(self.router.clone().oneshot(request).await?)
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Result<Response> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty())?).await
    }

    async fn post(&self, uri: &str, fields: &[(&str, &str)], cookie: Option<&str>) -> Result<Response> {
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body))?).await
    }

    /// Register `username` and return the session cookie pair to send back.
    async fn register(&self, username: &str) -> Result<String> {
        let response = self
            .post(
                "/users/register",
                &[
                    ("username", username),
                    ("password1", PASSWORD),
                    ("password2", PASSWORD),
                ],
                None,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::FOUND);
        session_cookie(&response).ok_or_else(|| anyhow!("registration set no session cookie"))
    }

    async fn create_topic(&self, cookie: &str, text: &str) -> Result<Value> {
        let response = self.post("/new_topic", &[("text", text)], Some(cookie)).await?;
        assert_eq!(response.status(), StatusCode::FOUND);
        let page = page(self.get("/topics", Some(cookie)).await?).await?;
        page.context["topics"]
            .as_array()
            .and_then(|topics| topics.iter().find(|topic| topic["text"] == text))
            .cloned()
            .ok_or_else(|| anyhow!("topic {text} not listed"))
    }
}

/// `learning_log_session=<token>` from the response's `Set-Cookie`, if a session was set.
fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| {
            pair.strip_prefix(SESSION_COOKIE_NAME)
                .and_then(|rest| rest.strip_prefix('='))
                .is_some_and(|token| !token.is_empty())
        })
        .map(str::to_string)
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

async fn page(response: Response) -> Result<Page> {
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    serde_json::from_slice(&body).context("response is not a page")
}

fn field_errors(page: &Page, field: &str) -> Vec<String> {
    page.context["form"]["fields"]
        .as_array()
        .and_then(|fields| fields.iter().find(|f| f["name"] == field))
        .and_then(|f| f["errors"].as_array())
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn str_field<'a>(value: &'a Value, key: &str) -> Result<&'a str> {
    value[key]
        .as_str()
        .ok_or_else(|| anyhow!("missing string field {key}"))
}

#[tokio::test]
async fn index_renders_for_anonymous_users() -> Result<()> {
    let app = TestApp::new();
    let page = page(app.get("/", None).await?).await?;
    assert_eq!(page.template, "learning_logs/index.html");
    assert_eq!(page.user, None);
    Ok(())
}

#[tokio::test]
async fn register_get_renders_empty_form() -> Result<()> {
    let app = TestApp::new();
    let page = page(app.get("/users/register", None).await?).await?;
    assert_eq!(page.template, "users/register.html");
    assert_eq!(page.context["form"]["bound"], Value::Bool(false));
    assert_eq!(app.store.user_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn register_with_mismatched_passwords_creates_nothing() -> Result<()> {
    let app = TestApp::new();
    let response = app
        .post(
            "/users/register",
            &[
                ("username", "ada"),
                ("password1", PASSWORD),
                ("password2", "correct horse battery staple"),
            ],
            None,
        )
        .await?;

    assert_eq!(session_cookie(&response), None);
    let page = page(response).await?;
    assert_eq!(page.template, "users/register.html");
    assert_eq!(page.user, None);
    assert_eq!(
        field_errors(&page, "password2"),
        [PASSWORD_MISMATCH_MESSAGE.to_string()]
    );
    // Passwords are never echoed back.
    assert_eq!(page.context["form"]["fields"][1]["value"], Value::Null);
    assert_eq!(app.store.user_count().await, 0);
    assert_eq!(app.store.session_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn register_creates_account_and_signs_in() -> Result<()> {
    let app = TestApp::new();
    let response = app
        .post(
            "/users/register",
            &[
                ("username", "ada"),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
            ],
            None,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/"));
    let cookie = session_cookie(&response).ok_or_else(|| anyhow!("no session cookie"))?;
    assert_eq!(app.store.user_count().await, 1);
    assert_eq!(app.store.session_count().await, 1);

    let page = page(app.get("/", Some(&cookie)).await?).await?;
    assert_eq!(page.user.as_deref(), Some("ada"));
    Ok(())
}

#[tokio::test]
async fn register_rejects_taken_username() -> Result<()> {
    let app = TestApp::new();
    app.register("ada").await?;

    let response = app
        .post(
            "/users/register",
            &[
                ("username", "ada"),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
            ],
            None,
        )
        .await?;
    assert_eq!(session_cookie(&response), None);
    let page = page(response).await?;
    assert_eq!(
        field_errors(&page, "username"),
        [USERNAME_TAKEN_MESSAGE.to_string()]
    );
    assert_eq!(app.store.user_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn logout_ends_session_for_any_method() -> Result<()> {
    let app = TestApp::new();
    for (index, method) in ["GET", "POST", "PUT", "DELETE"].into_iter().enumerate() {
        let cookie = app.register(&format!("user{index}")).await?;

        let response = app
            .send(
                Request::builder()
                    .method(method)
                    .uri("/users/logout")
                    .header(COOKIE, &cookie)
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::FOUND, "{method}");
        assert_eq!(location(&response), Some("/"));
        assert!(
            response
                .headers()
                .get(SET_COOKIE)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.contains("Max-Age=0"))
        );

        let page = page(app.get("/", Some(&cookie)).await?).await?;
        assert_eq!(page.user, None, "{method}");
    }
    assert_eq!(app.store.session_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn logout_without_session_still_redirects() -> Result<()> {
    let app = TestApp::new();
    let response = app.get("/users/logout", None).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/"));
    Ok(())
}

#[tokio::test]
async fn anonymous_requests_are_sent_to_login() -> Result<()> {
    let app = TestApp::new();
    let response = app.get("/topics", None).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/users/login?next=%2Ftopics"));

    let response = app.post("/new_topic", &[("text", "Chess")], None).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/users/login?next=%2Fnew_topic"));
    Ok(())
}

#[tokio::test]
async fn login_checks_credentials_and_follows_next() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.register("ada").await?;

    let response = app
        .post(
            "/users/login",
            &[("username", "ada"), ("password", "wrong password")],
            None,
        )
        .await?;
    assert_eq!(session_cookie(&response), None);
    let failed = page(response).await?;
    assert_eq!(failed.template, "users/login.html");
    assert_eq!(
        failed.context["form"]["non_field_errors"]
            .as_array()
            .map(Vec::len),
        Some(1)
    );

    let response = app
        .post(
            "/users/login?next=/topics",
            &[("username", "ada"), ("password", PASSWORD)],
            Some(&cookie),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/topics"));
    let fresh = session_cookie(&response).ok_or_else(|| anyhow!("no session cookie"))?;
    assert_ne!(fresh, cookie);
    // The session the request carried was replaced.
    assert_eq!(app.store.session_count().await, 1);
    assert_eq!(page(app.get("/", Some(&cookie)).await?).await?.user, None);
    Ok(())
}

#[tokio::test]
async fn login_ignores_offsite_next() -> Result<()> {
    let app = TestApp::new();
    app.register("ada").await?;
    let response = app
        .post(
            "/users/login",
            &[
                ("username", "ada"),
                ("password", PASSWORD),
                ("next", "//evil.example/"),
            ],
            None,
        )
        .await?;
    assert_eq!(location(&response), Some("/"));
    Ok(())
}

#[tokio::test]
async fn empty_topic_is_rejected() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.register("ada").await?;

    let form = page(app.post("/new_topic", &[("text", "   ")], Some(&cookie)).await?).await?;
    assert_eq!(form.template, "learning_logs/new_topic.html");
    assert_eq!(field_errors(&form, "text"), [REQUIRED_MESSAGE.to_string()]);

    let topics = page(app.get("/topics", Some(&cookie)).await?).await?;
    assert_eq!(topics.context["topics"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn topic_text_over_limit_is_rejected() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.register("ada").await?;
    let text = "x".repeat(201);
    let page = page(app.post("/new_topic", &[("text", text.as_str())], Some(&cookie)).await?).await?;
    assert_eq!(
        field_errors(&page, "text"),
        ["Ensure this value has at most 200 characters (it has 201).".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn created_topic_keeps_text_and_date() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.register("ada").await?;

    let response = app.post("/new_topic", &[("text", "Chess")], Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/topics"));

    let first = app.create_topic(&cookie, "Rock Climbing").await?;
    let again = page(app.get("/topics", Some(&cookie)).await?).await?;
    let topics = again.context["topics"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(topics.len(), 2);
    // Oldest first.
    assert_eq!(topics[0]["text"], "Chess");
    assert_eq!(topics[1]["date_added"], first["date_added"]);
    Ok(())
}

#[tokio::test]
async fn entries_are_listed_newest_first() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.register("ada").await?;
    let topic = app.create_topic(&cookie, "Chess").await?;
    let topic_id = str_field(&topic, "id")?;

    for text in ["Opening theory", "Endgames"] {
        let response = app
            .post(&format!("/new_entry/{topic_id}"), &[("text", text)], Some(&cookie))
            .await?;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), Some(format!("/topics/{topic_id}").as_str()));
    }

    let page = page(app.get(&format!("/topics/{topic_id}"), Some(&cookie)).await?).await?;
    assert_eq!(page.template, "learning_logs/topic.html");
    assert_eq!(page.context["topic"]["text"], "Chess");
    assert_eq!(page.context["entries"][0]["text"], "Endgames");
    assert_eq!(page.context["entries"][1]["text"], "Opening theory");
    Ok(())
}

#[tokio::test]
async fn editing_entry_keeps_date_added() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.register("ada").await?;
    let topic = app.create_topic(&cookie, "Chess").await?;
    let topic_id = str_field(&topic, "id")?;
    app.post(&format!("/new_entry/{topic_id}"), &[("text", "The Sicilian")], Some(&cookie))
        .await?;

    let before = page(app.get(&format!("/topics/{topic_id}"), Some(&cookie)).await?).await?;
    let entry = before.context["entries"][0].clone();
    let entry_id = str_field(&entry, "id")?;

    let form = page(app.get(&format!("/edit_entry/{entry_id}"), Some(&cookie)).await?).await?;
    assert_eq!(form.template, "learning_logs/edit_entry.html");
    assert_eq!(form.context["form"]["fields"][0]["value"], "The Sicilian");

    let response = app
        .post(&format!("/edit_entry/{entry_id}"), &[("text", "The French")], Some(&cookie))
        .await?;
    assert_eq!(location(&response), Some(format!("/topics/{topic_id}").as_str()));

    let after = page(app.get(&format!("/topics/{topic_id}"), Some(&cookie)).await?).await?;
    assert_eq!(after.context["entries"][0]["text"], "The French");
    assert_eq!(after.context["entries"][0]["date_added"], entry["date_added"]);
    Ok(())
}

#[tokio::test]
async fn other_users_topics_are_not_found() -> Result<()> {
    let app = TestApp::new();
    let owner = app.register("ada").await?;
    let intruder = app.register("grace").await?;
    let topic = app.create_topic(&owner, "Chess").await?;
    let topic_id = str_field(&topic, "id")?;
    app.post(&format!("/new_entry/{topic_id}"), &[("text", "Private")], Some(&owner))
        .await?;
    let entries = page(app.get(&format!("/topics/{topic_id}"), Some(&owner)).await?).await?;
    let entry_id = str_field(&entries.context["entries"][0], "id")?.to_string();

    let response = app.get(&format!("/topics/{topic_id}"), Some(&intruder)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post(&format!("/new_entry/{topic_id}"), &[("text", "Mine now")], Some(&intruder))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post(&format!("/edit_entry/{entry_id}"), &[("text", "Mine now")], Some(&intruder))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let topics = page(app.get("/topics", Some(&intruder)).await?).await?;
    assert_eq!(topics.context["topics"].as_array().map(Vec::len), Some(0));

    let unchanged = page(app.get(&format!("/topics/{topic_id}"), Some(&owner)).await?).await?;
    assert_eq!(unchanged.context["entries"].as_array().map(Vec::len), Some(1));
    assert_eq!(unchanged.context["entries"][0]["text"], "Private");
    Ok(())
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.register("ada").await?;
    let missing = uuid::Uuid::now_v7();
    for uri in [
        format!("/topics/{missing}"),
        format!("/edit_entry/{missing}"),
        "/topics/not-a-uuid".to_string(),
    ] {
        let response = app.get(&uri, Some(&cookie)).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn health_reports_store_status() -> Result<()> {
    let app = TestApp::new();
    let response = app.get("/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.headers().contains_key("x-request-id"));
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let health: Value = serde_json::from_slice(&body)?;
    assert_eq!(health["database"], "ok");
    assert_eq!(health["name"], env!("CARGO_PKG_NAME"));
    Ok(())
}

/// Creates accounts but never finds them again.
struct UnresolvableUsers(Arc<MemoryStore>);

#[async_trait]
impl UserStore for UnresolvableUsers {
    async fn insert_user(&self, username: &str, password_hash: &str) -> Result<InsertUserOutcome> {
        self.0.insert_user(username, password_hash).await
    }

    async fn find_user_by_username(&self, _username: &str) -> Result<Option<UserRecord>> {
        Ok(None)
    }
}

#[tokio::test]
async fn register_fails_without_session_when_new_account_cannot_sign_in() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        AppConfig::new(),
        Arc::new(UnresolvableUsers(store.clone())),
        store.clone(),
        store.clone(),
    );
    let app = TestApp {
        router: router(state),
        store,
    };

    let response = app
        .post(
            "/users/register",
            &[
                ("username", "ada"),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
            ],
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(app.store.user_count().await, 1);
    assert_eq!(app.store.session_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn short_username_registers_with_unrelated_password() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.register("e").await?;
    let page = page(app.get("/", Some(&cookie)).await?).await?;
    assert_eq!(page.user.as_deref(), Some("e"));
    Ok(())
}

#[tokio::test]
async fn huge_session_ttl_is_capped() -> Result<()> {
    let app = TestApp::with_config(AppConfig::new().with_session_ttl_seconds(i64::MAX));
    let response = app
        .post(
            "/users/register",
            &[
                ("username", "ada"),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
            ],
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    let max_age = format!("Max-Age={MAX_SESSION_TTL_SECONDS}");
    assert!(
        response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains(&max_age))
    );
    assert_eq!(app.store.session_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn session_token_only_counts_as_a_cookie() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.register("ada").await?;
    let token = cookie
        .strip_prefix(&format!("{SESSION_COOKIE_NAME}="))
        .ok_or_else(|| anyhow!("unexpected cookie {cookie}"))?;

    let response = app
        .send(
            Request::builder()
                .method("GET")
                .uri("/topics")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/users/login?next=%2Ftopics"));
    Ok(())
}

#[tokio::test]
async fn null_characters_are_a_field_error() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.register("ada").await?;

    let response = app
        .post("/new_topic", &[("text", "Ch\0ess")], Some(&cookie))
        .await?;
    let form = page(response).await?;
    assert_eq!(form.template, "learning_logs/new_topic.html");
    assert_eq!(
        field_errors(&form, "text"),
        [NULL_CHARACTER_MESSAGE.to_string()]
    );

    let topics = page(app.get("/topics", Some(&cookie)).await?).await?;
    assert_eq!(topics.context["topics"].as_array().map(Vec::len), Some(0));
    Ok(())
}
