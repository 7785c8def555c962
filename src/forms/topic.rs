use super::{FieldConfig, Form};
use crate::models::{NewTopic, topic::TOPIC_TEXT_MAX_LENGTH};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub static TOPIC_FIELDS: [FieldConfig; 1] =
    [FieldConfig::text("text", "topic_text").with_max_length(TOPIC_TEXT_MAX_LENGTH)];

#[derive(Serialize, Debug, Clone)]
#[serde(transparent)]
pub struct TopicForm {
    form: Form,
}

impl TopicForm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            form: Form::new(&TOPIC_FIELDS),
        }
    }

    #[must_use]
    pub fn bind(data: &HashMap<String, String>) -> Self {
        Self {
            form: Form::bind(&TOPIC_FIELDS, data),
        }
    }

    /// Produce the topic to persist for `owner`, or the form with its errors.
    ///
    /// # Errors
    /// Returns the form itself when any field failed validation.
    pub fn save(self, owner: Uuid) -> Result<NewTopic, Self> {
        match self.form.cleaned("text") {
            Some(text) if self.form.is_valid() => Ok(NewTopic {
                text: text.to_string(),
                owner,
            }),
            _ => Err(self),
        }
    }

    #[must_use]
    pub const fn form(&self) -> &Form {
        &self.form
    }
}

impl Default for TopicForm {
    fn default() -> Self {
        Self::new()
    }
}
