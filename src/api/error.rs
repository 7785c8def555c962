use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::render::redirect;

pub const LOGIN_URL: &str = "/users/login";

/// Failures a handler can end with. Validation problems are not errors: forms
/// carry them back to the page instead.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    /// Anonymous request to a page that needs a session; `next` is where to return.
    #[error("login required")]
    LoginRequired { next: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
            }
            Self::LoginRequired { next } => {
                let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
                redirect(&format!("{LOGIN_URL}?next={next}"))
            }
            Self::Internal(err) => {
                error!("Request failed: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
