//! Form layer: explicit field descriptors and binding of raw request values.
//!
//! A form starts unbound (rendered empty or with initial values). Binding runs
//! every field's checks; the typed wrappers then hand back either a validated
//! draft ready to persist or themselves, carrying the errors to re-render.

mod field;
pub mod entry;
pub mod login;
pub mod registration;
pub mod topic;

pub use self::entry::EntryForm;
pub use self::field::{FieldConfig, NULL_CHARACTER_MESSAGE, REQUIRED_MESSAGE, Widget};
pub use self::login::{Credentials, LoginForm};
pub use self::registration::{PasswordPolicy, RegistrationForm};
pub use self::topic::TopicForm;

use serde::{Serialize, Serializer, ser::SerializeStruct};
use std::collections::{BTreeMap, HashMap};

/// Field-level and form-level validation messages.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
    non_field: Vec<String>,
}

impl FormErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    fn push(&mut self, field: Option<&'static str>, message: String) {
        match field {
            Some(name) => self.fields.entry(name).or_default().push(message),
            None => self.non_field.push(message),
        }
    }
}

/// Generic form state over a static field list.
#[derive(Debug, Clone)]
pub struct Form {
    fields: &'static [FieldConfig],
    values: BTreeMap<&'static str, String>,
    errors: FormErrors,
    bound: bool,
}

impl Form {
    #[must_use]
    pub fn new(fields: &'static [FieldConfig]) -> Self {
        Self {
            fields,
            values: BTreeMap::new(),
            errors: FormErrors::default(),
            bound: false,
        }
    }

    /// Unbound form pre-filled with existing values.
    #[must_use]
    pub fn with_initial(fields: &'static [FieldConfig], initial: &[(&str, &str)]) -> Self {
        let mut form = Self::new(fields);
        for field in fields {
            if let Some((_, value)) = initial.iter().find(|(name, _)| *name == field.name) {
                form.values.insert(field.name, (*value).to_string());
            }
        }
        form
    }

    /// Bind submitted data and run each field's checks.
    #[must_use]
    pub fn bind(fields: &'static [FieldConfig], data: &HashMap<String, String>) -> Self {
        let mut form = Self::new(fields);
        form.bound = true;
        for field in fields {
            let raw = data.get(field.name).map(String::as_str);
            match field.clean(raw) {
                Ok(value) => {
                    form.values.insert(field.name, value);
                }
                Err(message) => {
                    if let Some(raw) = raw {
                        form.values.insert(field.name, raw.to_string());
                    }
                    form.errors.push(Some(field.name), message);
                }
            }
        }
        form
    }

    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.bound
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.bound && self.errors.is_empty()
    }

    /// Cleaned value of a field that passed its own checks.
    #[must_use]
    pub fn cleaned(&self, name: &str) -> Option<&str> {
        if !self.bound || !self.errors.field(name).is_empty() {
            return None;
        }
        self.values.get(name).map(String::as_str)
    }

    /// Attach an error to a field, or to the form when `field` is `None`.
    pub fn add_error(&mut self, field: Option<&'static str>, message: impl Into<String>) {
        self.errors.push(field, message.into());
    }

    #[must_use]
    pub const fn errors(&self) -> &FormErrors {
        &self.errors
    }

    #[must_use]
    pub const fn fields(&self) -> &'static [FieldConfig] {
        self.fields
    }
}

#[derive(Serialize)]
struct FieldView<'a> {
    #[serde(flatten)]
    config: &'a FieldConfig,
    value: Option<&'a str>,
    errors: &'a [String],
}

impl Serialize for Form {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields: Vec<FieldView<'_>> = self
            .fields
            .iter()
            .map(|config| FieldView {
                config,
                value: if config.widget.renders_value() {
                    self.values.get(config.name).map(String::as_str)
                } else {
                    None
                },
                errors: self.errors.field(config.name),
            })
            .collect();

        let mut state = serializer.serialize_struct("Form", 3)?;
        state.serialize_field("bound", &self.bound)?;
        state.serialize_field("fields", &fields)?;
        state.serialize_field("non_field_errors", self.errors.non_field())?;
        state.end()
    }
}
