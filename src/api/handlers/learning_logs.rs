//! Learning-log views. Everything except the index needs a signed-in user,
//! and topics are only visible to the user who owns them.

use super::{EntryInput, FormData, TopicInput};
use crate::{
    api::{
        ApiError, LoggedIn, Page, RequestContext,
        render::{redirect, render},
    },
    forms::{EntryForm, TopicForm},
    models::{Entry, Topic},
    storage::LogStore,
};
use anyhow::Context;
use axum::{Form, extract::Path, http::Method, response::Response};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub const INDEX_TEMPLATE: &str = "learning_logs/index.html";
pub const TOPICS_TEMPLATE: &str = "learning_logs/topics.html";
pub const TOPIC_TEMPLATE: &str = "learning_logs/topic.html";
pub const NEW_TOPIC_TEMPLATE: &str = "learning_logs/new_topic.html";
pub const NEW_ENTRY_TEMPLATE: &str = "learning_logs/new_entry.html";
pub const EDIT_ENTRY_TEMPLATE: &str = "learning_logs/edit_entry.html";

#[derive(Serialize)]
struct TopicsContext<'a> {
    topics: &'a [Topic],
}

#[derive(Serialize)]
struct TopicContext<'a> {
    topic: &'a Topic,
    entries: &'a [Entry],
}

#[derive(Serialize)]
struct NewTopicContext<'a> {
    form: &'a TopicForm,
}

#[derive(Serialize)]
struct EntryFormContext<'a> {
    topic: &'a Topic,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry: Option<&'a Entry>,
    form: &'a EntryForm,
}

fn topic_url(topic_id: Uuid) -> String {
    format!("/topics/{topic_id}")
}

/// Ids come from the path as text so that malformed ones read as missing
/// rather than as a bad request.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

/// Load a topic, treating someone else's topic the same as a missing one.
async fn owned_topic(logs: &dyn LogStore, topic_id: Uuid, owner: Uuid) -> Result<Topic, ApiError> {
    match logs
        .topic(topic_id)
        .await
        .context("failed to load topic")?
    {
        Some(topic) if topic.owner == owner => Ok(topic),
        Some(_) => {
            debug!(%topic_id, "Topic belongs to another user");
            Err(ApiError::NotFound)
        }
        None => Err(ApiError::NotFound),
    }
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Home page", body = Page)
    ),
    tag = "learning_logs"
)]
#[instrument(skip_all)]
pub async fn index(ctx: RequestContext) -> Result<Response, ApiError> {
    render(&ctx, INDEX_TEMPLATE, json!({}))
}

#[utoipa::path(
    get,
    path = "/topics",
    responses(
        (status = 200, description = "The caller's topics, oldest first", body = Page),
        (status = 302, description = "Not signed in; redirects to the login page")
    ),
    tag = "learning_logs"
)]
#[instrument(skip_all, fields(user_id = %logged_in.user.user_id))]
pub async fn topics(logged_in: LoggedIn) -> Result<Response, ApiError> {
    let topics = logged_in
        .context
        .state()
        .logs()
        .topics_for_owner(logged_in.user.user_id)
        .await
        .context("failed to list topics")?;
    render(&logged_in.context, TOPICS_TEMPLATE, TopicsContext { topics: &topics })
}

#[utoipa::path(
    get,
    path = "/topics/{topic_id}",
    params(("topic_id" = Uuid, Path, description = "Topic id")),
    responses(
        (status = 200, description = "The topic with its entries, newest first", body = Page),
        (status = 302, description = "Not signed in; redirects to the login page"),
        (status = 404, description = "No such topic for this user")
    ),
    tag = "learning_logs"
)]
#[instrument(skip_all, fields(topic_id = %topic_id))]
pub async fn topic(
    logged_in: LoggedIn,
    Path(topic_id): Path<String>,
) -> Result<Response, ApiError> {
    let logs = logged_in.context.state().logs();
    let topic = owned_topic(logs, parse_id(&topic_id)?, logged_in.user.user_id).await?;
    let entries = logs
        .entries_for_topic(topic.id)
        .await
        .context("failed to list entries")?;
    render(
        &logged_in.context,
        TOPIC_TEMPLATE,
        TopicContext {
            topic: &topic,
            entries: &entries,
        },
    )
}

#[utoipa::path(
    method(get, post),
    path = "/new_topic",
    request_body(
        content = TopicInput,
        content_type = "application/x-www-form-urlencoded",
        description = "Only read on POST"
    ),
    responses(
        (status = 200, description = "Topic form, with errors after an invalid submission", body = Page),
        (status = 302, description = "Topic saved, or not signed in")
    ),
    tag = "learning_logs"
)]
#[instrument(skip_all, fields(method = %method))]
pub async fn new_topic(
    logged_in: LoggedIn,
    method: Method,
    Form(data): Form<FormData>,
) -> Result<Response, ApiError> {
    let form = if method == Method::POST {
        match TopicForm::bind(&data).save(logged_in.user.user_id) {
            Ok(new_topic) => {
                let topic = logged_in
                    .context
                    .state()
                    .logs()
                    .insert_topic(new_topic)
                    .await
                    .context("failed to save topic")?;
                info!(topic_id = %topic.id, "Topic created");
                return Ok(redirect("/topics"));
            }
            Err(form) => form,
        }
    } else {
        TopicForm::new()
    };

    render(
        &logged_in.context,
        NEW_TOPIC_TEMPLATE,
        NewTopicContext { form: &form },
    )
}

#[utoipa::path(
    method(get, post),
    path = "/new_entry/{topic_id}",
    params(("topic_id" = Uuid, Path, description = "Topic to add the entry to")),
    request_body(
        content = EntryInput,
        content_type = "application/x-www-form-urlencoded",
        description = "Only read on POST"
    ),
    responses(
        (status = 200, description = "Entry form, with errors after an invalid submission", body = Page),
        (status = 302, description = "Entry saved, or not signed in"),
        (status = 404, description = "No such topic for this user")
    ),
    tag = "learning_logs"
)]
#[instrument(skip_all, fields(method = %method, topic_id = %topic_id))]
pub async fn new_entry(
    logged_in: LoggedIn,
    Path(topic_id): Path<String>,
    method: Method,
    Form(data): Form<FormData>,
) -> Result<Response, ApiError> {
    let logs = logged_in.context.state().logs();
    let topic = owned_topic(logs, parse_id(&topic_id)?, logged_in.user.user_id).await?;

    let form = if method == Method::POST {
        match EntryForm::bind(&data).save(topic.id) {
            Ok(new_entry) => {
                let entry = logs
                    .insert_entry(new_entry)
                    .await
                    .context("failed to save entry")?;
                info!(entry_id = %entry.id, "Entry created");
                return Ok(redirect(&topic_url(topic.id)));
            }
            Err(form) => form,
        }
    } else {
        EntryForm::new()
    };

    render(
        &logged_in.context,
        NEW_ENTRY_TEMPLATE,
        EntryFormContext {
            topic: &topic,
            entry: None,
            form: &form,
        },
    )
}

#[utoipa::path(
    method(get, post),
    path = "/edit_entry/{entry_id}",
    params(("entry_id" = Uuid, Path, description = "Entry to edit")),
    request_body(
        content = EntryInput,
        content_type = "application/x-www-form-urlencoded",
        description = "Only read on POST"
    ),
    responses(
        (status = 200, description = "Entry form pre-filled with the current text", body = Page),
        (status = 302, description = "Entry updated, or not signed in"),
        (status = 404, description = "No such entry for this user")
    ),
    tag = "learning_logs"
)]
#[instrument(skip_all, fields(method = %method, entry_id = %entry_id))]
pub async fn edit_entry(
    logged_in: LoggedIn,
    Path(entry_id): Path<String>,
    method: Method,
    Form(data): Form<FormData>,
) -> Result<Response, ApiError> {
    let logs = logged_in.context.state().logs();
    let entry = logs
        .entry(parse_id(&entry_id)?)
        .await
        .context("failed to load entry")?
        .ok_or(ApiError::NotFound)?;
    let topic = owned_topic(logs, entry.topic, logged_in.user.user_id).await?;

    let form = if method == Method::POST {
        match EntryForm::bind(&data).cleaned_text() {
            Ok(text) => {
                logs.update_entry_text(entry.id, &text)
                    .await
                    .context("failed to update entry")?
                    .ok_or(ApiError::NotFound)?;
                info!(entry_id = %entry.id, "Entry updated");
                return Ok(redirect(&topic_url(topic.id)));
            }
            Err(form) => form,
        }
    } else {
        EntryForm::for_entry(&entry)
    };

    render(
        &logged_in.context,
        EDIT_ENTRY_TEMPLATE,
        EntryFormContext {
            topic: &topic,
            entry: Some(&entry),
            form: &form,
        },
    )
}
