use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const USERNAME_MAX_LENGTH: usize = 150;

/// An account that owns topics. The password hash never leaves the store layer.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub date_joined: DateTime<Utc>,
}

/// Registration data that passed form validation.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: SecretString,
}
