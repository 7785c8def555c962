//! Page and redirect responses.
//!
//! Pages are JSON documents naming a template and carrying its context, so any
//! front end can draw them.

use super::{ApiError, RequestContext};
use anyhow::Context;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

pub const INDEX_URL: &str = "/";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page {
    pub template: String,
    /// Username of the signed-in user, `null` for anonymous requests.
    pub user: Option<String>,
    #[schema(value_type = Object)]
    pub context: Value,
}

/// Render `template` with `context` for the current request.
///
/// # Errors
/// Returns `ApiError::Internal` if the context cannot be serialized.
pub fn render(
    ctx: &RequestContext,
    template: &str,
    context: impl Serialize,
) -> Result<Response, ApiError> {
    let context = serde_json::to_value(context)
        .with_context(|| format!("failed to serialize context for {template}"))?;
    let page = Page {
        template: template.to_string(),
        user: ctx.username().map(str::to_string),
        context,
    };
    Ok((StatusCode::OK, Json(page)).into_response())
}

/// 302 to `location`. Locations are built from our own routes; anything that is
/// not a valid header value falls back to the index.
pub fn redirect(location: &str) -> Response {
    let location =
        HeaderValue::from_str(location).unwrap_or_else(|_| HeaderValue::from_static(INDEX_URL));
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

/// Keep `next` only when it points back into this site.
#[must_use]
pub fn local_redirect_target(next: Option<&str>) -> Option<&str> {
    next.map(str::trim)
        .filter(|next| next.starts_with('/') && !next.starts_with("//") && !next.contains('\\'))
}
