pub mod account;
pub mod health;
pub mod learning_logs;

use serde::Deserialize;
use std::collections::HashMap;
use utoipa::ToSchema;

/// Raw `application/x-www-form-urlencoded` values as submitted.
pub(crate) type FormData = HashMap<String, String>;

// Request body schemas for the OpenAPI document. Handlers bind the raw values
// through the form layer rather than deserializing into these.

#[derive(ToSchema, Deserialize, Debug)]
pub struct TopicInput {
    pub text: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct EntryInput {
    pub text: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct RegistrationInput {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}
