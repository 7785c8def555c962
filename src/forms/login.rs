use super::{FieldConfig, Form};
use crate::models::user::USERNAME_MAX_LENGTH;
use secrecy::SecretString;
use serde::Serialize;
use std::collections::HashMap;

pub const INVALID_LOGIN_MESSAGE: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

pub static LOGIN_FIELDS: [FieldConfig; 2] = [
    FieldConfig::text("username", "Username").with_max_length(USERNAME_MAX_LENGTH),
    FieldConfig::password("password", "Password"),
];

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

#[derive(Serialize, Debug, Clone)]
#[serde(transparent)]
pub struct LoginForm {
    form: Form,
}

impl LoginForm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            form: Form::new(&LOGIN_FIELDS),
        }
    }

    #[must_use]
    pub fn bind(data: &HashMap<String, String>) -> Self {
        Self {
            form: Form::bind(&LOGIN_FIELDS, data),
        }
    }

    /// Credentials to check, once both fields are present.
    pub fn credentials(&self) -> Option<Credentials> {
        if !self.form.is_valid() {
            return None;
        }
        match (self.form.cleaned("username"), self.form.cleaned("password")) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.to_string(),
                password: SecretString::from(password.to_string()),
            }),
            _ => None,
        }
    }

    /// Report a failed authentication without saying which field was wrong.
    pub fn reject_credentials(&mut self) {
        self.form.add_error(None, INVALID_LOGIN_MESSAGE);
    }

    #[must_use]
    pub const fn form(&self) -> &Form {
        &self.form
    }
}

impl Default for LoginForm {
    fn default() -> Self {
        Self::new()
    }
}
