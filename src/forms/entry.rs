use super::{FieldConfig, Form, Widget};
use crate::models::{Entry, NewEntry};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub static ENTRY_FIELDS: [FieldConfig; 1] =
    [FieldConfig::text("text", "entry_text").with_widget(Widget::textarea().with_cols(80))];

#[derive(Serialize, Debug, Clone)]
#[serde(transparent)]
pub struct EntryForm {
    form: Form,
}

impl EntryForm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            form: Form::new(&ENTRY_FIELDS),
        }
    }

    /// Unbound form showing the current text of `entry`.
    #[must_use]
    pub fn for_entry(entry: &Entry) -> Self {
        Self {
            form: Form::with_initial(&ENTRY_FIELDS, &[("text", entry.text.as_str())]),
        }
    }

    #[must_use]
    pub fn bind(data: &HashMap<String, String>) -> Self {
        Self {
            form: Form::bind(&ENTRY_FIELDS, data),
        }
    }

    /// Validated entry text, or the form with its errors.
    ///
    /// # Errors
    /// Returns the form itself when the text failed validation.
    pub fn cleaned_text(self) -> Result<String, Self> {
        match self.form.cleaned("text") {
            Some(text) if self.form.is_valid() => Ok(text.to_string()),
            _ => Err(self),
        }
    }

    /// Produce the entry to persist under `topic`, or the form with its errors.
    ///
    /// # Errors
    /// Returns the form itself when the text failed validation.
    pub fn save(self, topic: Uuid) -> Result<NewEntry, Self> {
        self.cleaned_text().map(|text| NewEntry { topic, text })
    }

    #[must_use]
    pub const fn form(&self) -> &Form {
        &self.form
    }
}

impl Default for EntryForm {
    fn default() -> Self {
        Self::new()
    }
}
