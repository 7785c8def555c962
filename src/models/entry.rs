use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Number of characters kept by the short representation of an entry.
pub const ENTRY_SUMMARY_CHARS: usize = 50;

/// A single journal note under one topic.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: Uuid,
    pub topic: Uuid,
    pub text: String,
    /// Set by the store when the row is created; edits keep it.
    pub date_added: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub topic: Uuid,
    pub text: String,
}

impl Entry {
    /// First 50 characters followed by `...`.
    ///
    /// The ellipsis is always appended, short texts included.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary: String = self.text.chars().take(ENTRY_SUMMARY_CHARS).collect();
        summary.push_str("...");
        summary
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
