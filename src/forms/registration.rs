use super::{FieldConfig, Form};
use crate::models::{NewAccount, user::USERNAME_MAX_LENGTH};
use regex::Regex;
use secrecy::SecretString;
use serde::Serialize;
use std::collections::HashMap;

const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;

pub const PASSWORD_MISMATCH_MESSAGE: &str = "The two password fields didn't match.";
pub const USERNAME_TAKEN_MESSAGE: &str = "A user with that username already exists.";
pub const INVALID_USERNAME_MESSAGE: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

pub static REGISTRATION_FIELDS: [FieldConfig; 3] = [
    FieldConfig::text("username", "Username")
        .with_max_length(USERNAME_MAX_LENGTH)
        .with_help_text("Required. 150 characters or fewer. Letters, digits and @/./+/-/_ only."),
    FieldConfig::password("password1", "Password"),
    FieldConfig::password("password2", "Password confirmation")
        .with_help_text("Enter the same password as before, for verification."),
];

/// Rules a new password must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    min_length: usize,
}

impl PasswordPolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_length: DEFAULT_PASSWORD_MIN_LENGTH,
        }
    }

    #[must_use]
    pub const fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    #[must_use]
    pub const fn min_length(&self) -> usize {
        self.min_length
    }

    /// Every rule the password breaks, in a stable order.
    #[must_use]
    pub fn validate(&self, password: &str, username: Option<&str>) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(username) = username.filter(|name| !name.is_empty())
            && too_similar(password, username)
        {
            errors.push("The password is too similar to the username.".to_string());
        }

        if password.chars().count() < self.min_length {
            errors.push(format!(
                "This password is too short. It must contain at least {} characters.",
                self.min_length
            ));
        }

        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            errors.push("This password is entirely numeric.".to_string());
        }

        errors
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::new()
    }
}

const MAX_SIMILARITY: f64 = 0.7;

/// Compare the password with the whole username and with each of its
/// word-character runs.
fn too_similar(password: &str, username: &str) -> bool {
    let password: Vec<char> = password.to_lowercase().chars().collect();
    let username = username.to_lowercase();

    std::iter::once(username.as_str())
        .chain(username.split(|c: char| !(c.is_alphanumeric() || c == '_')))
        .filter(|part| !part.is_empty())
        .any(|part| {
            let part: Vec<char> = part.chars().collect();
            similarity_ratio(&password, &part) >= MAX_SIMILARITY
        })
}

/// `2 * LCS / (len(a) + len(b))`, in `0.0..=1.0`.
#[allow(clippy::cast_precision_loss)]
fn similarity_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for &x in a {
        for (j, &y) in b.iter().enumerate() {
            current[j + 1] = if x == y {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    (2 * previous[b.len()]) as f64 / total as f64
}

pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[\w.@+-]+$").is_ok_and(|re| re.is_match(username))
}

/// New-account form: username plus a password typed twice.
#[derive(Serialize, Debug, Clone)]
#[serde(transparent)]
pub struct RegistrationForm {
    form: Form,
}

impl RegistrationForm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            form: Form::new(&REGISTRATION_FIELDS),
        }
    }

    /// Bind submitted data, then run the username, confirmation and password rules.
    #[must_use]
    pub fn bind(data: &HashMap<String, String>, policy: &PasswordPolicy) -> Self {
        let mut form = Form::bind(&REGISTRATION_FIELDS, data);

        let username = form.cleaned("username").map(str::to_string);
        if let Some(username) = &username
            && !valid_username(username)
        {
            form.add_error(Some("username"), INVALID_USERNAME_MESSAGE);
        }

        if let (Some(password1), Some(password2)) = (
            form.cleaned("password1").map(str::to_string),
            form.cleaned("password2").map(str::to_string),
        ) {
            if password1 == password2 {
                for message in policy.validate(&password2, username.as_deref()) {
                    form.add_error(Some("password2"), message);
                }
            } else {
                form.add_error(Some("password2"), PASSWORD_MISMATCH_MESSAGE);
            }
        }

        Self { form }
    }

    /// Username that passed its own field checks.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.form.cleaned("username")
    }

    /// Flag the submitted username as already registered.
    pub fn reject_taken_username(&mut self) {
        self.form.add_error(Some("username"), USERNAME_TAKEN_MESSAGE);
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.form.is_valid()
    }

    /// The account to create, or the form with its errors.
    ///
    /// # Errors
    /// Returns the form itself when any rule failed.
    pub fn clean(self) -> Result<NewAccount, Self> {
        if !self.form.is_valid() {
            return Err(self);
        }
        match (self.form.cleaned("username"), self.form.cleaned("password1")) {
            (Some(username), Some(password)) => Ok(NewAccount {
                username: username.to_string(),
                password: SecretString::from(password.to_string()),
            }),
            _ => Err(self),
        }
    }

    #[must_use]
    pub const fn form(&self) -> &Form {
        &self.form
    }
}

impl Default for RegistrationForm {
    fn default() -> Self {
        Self::new()
    }
}
