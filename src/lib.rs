//! # Learning Log
//!
//! `learning_log` is a small personal journal service. Authenticated users create
//! topics and append entries under each topic.
//!
//! ## Layers
//!
//! - **Models:** `Topic`, `Entry` and the `User` that owns topics. Records are
//!   created once and their `date_added` never changes afterwards.
//! - **Forms:** every form is described by explicit [`forms::FieldConfig`] values
//!   (label, widget, required, max length). Binding raw request fields yields a
//!   validated draft ready to persist, or the form carrying field-level errors.
//! - **Storage:** `UserStore`, `SessionStore` and `LogStore` traits with a Postgres
//!   implementation (sqlx) and an in-memory one used for local runs and tests.
//! - **API:** axum handlers receive the resolved session as an explicit
//!   [`api::RequestContext`]; pages are returned as JSON documents naming
//!   the template they belong to.
//!
//! ## Sessions
//!
//! Session tokens are random 32-byte values handed to the browser in an
//! `HttpOnly` cookie. Only the SHA-256 hash of a token is stored, and expired
//! sessions never authenticate.

pub mod api;
pub mod auth;
pub mod cli;
pub mod forms;
pub mod models;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
