use serde::Serialize;

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const NULL_CHARACTER_MESSAGE: &str = "Null characters are not allowed.";

/// Input widgets a field may be rendered with.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Widget {
    TextInput,
    Textarea { cols: u16, rows: u16 },
    PasswordInput,
}

impl Widget {
    /// A 40x10 text area.
    #[must_use]
    pub const fn textarea() -> Self {
        Self::Textarea { cols: 40, rows: 10 }
    }

    /// Override the column count of a text area; other widgets are returned unchanged.
    #[must_use]
    pub const fn with_cols(self, cols: u16) -> Self {
        match self {
            Self::Textarea { rows, .. } => Self::Textarea { cols, rows },
            other => other,
        }
    }

    /// Whether a submitted value may be echoed back when the form is re-rendered.
    #[must_use]
    pub const fn renders_value(self) -> bool {
        !matches!(self, Self::PasswordInput)
    }
}

/// Explicit description of one form field.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldConfig {
    pub name: &'static str,
    pub label: &'static str,
    pub widget: Widget,
    pub required: bool,
    pub max_length: Option<usize>,
    pub help_text: Option<&'static str>,
    /// Trim surrounding whitespace before validating.
    #[serde(skip)]
    pub strip: bool,
}

impl FieldConfig {
    /// A required, stripped text input without a length limit.
    #[must_use]
    pub const fn text(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            widget: Widget::TextInput,
            required: true,
            max_length: None,
            help_text: None,
            strip: true,
        }
    }

    /// A required password input; values are never stripped or echoed.
    #[must_use]
    pub const fn password(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            widget: Widget::PasswordInput,
            required: true,
            max_length: None,
            help_text: None,
            strip: false,
        }
    }

    #[must_use]
    pub const fn with_widget(mut self, widget: Widget) -> Self {
        self.widget = widget;
        self
    }

    #[must_use]
    pub const fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    #[must_use]
    pub const fn with_help_text(mut self, help_text: &'static str) -> Self {
        self.help_text = Some(help_text);
        self
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Validate a raw submitted value against this field's constraints.
    ///
    /// # Errors
    /// Returns the user-facing message when the value is missing, too long or
    /// contains a NUL character.
    pub fn clean(&self, raw: Option<&str>) -> Result<String, String> {
        let raw = raw.unwrap_or_default();
        if raw.contains('\0') {
            return Err(NULL_CHARACTER_MESSAGE.to_string());
        }
        let value = if self.strip { raw.trim() } else { raw };

        if value.is_empty() {
            if self.required {
                return Err(REQUIRED_MESSAGE.to_string());
            }
            return Ok(String::new());
        }

        if let Some(max_length) = self.max_length {
            let length = value.chars().count();
            if length > max_length {
                return Err(format!(
                    "Ensure this value has at most {max_length} characters (it has {length})."
                ));
            }
        }

        Ok(value.to_string())
    }
}
