use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Upper bound for `Topic::text`, in characters.
pub const TOPIC_TEXT_MAX_LENGTH: usize = 200;

/// A subject a user journals under.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: Uuid,
    pub text: String,
    /// Set by the store when the row is created; never rewritten.
    pub date_added: DateTime<Utc>,
    pub owner: Uuid,
}

/// A validated topic waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTopic {
    pub text: String,
    pub owner: Uuid,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_full_text() {
        let text = "a".repeat(TOPIC_TEXT_MAX_LENGTH);
        let topic = Topic {
            id: Uuid::now_v7(),
            text: text.clone(),
            date_added: Utc::now(),
            owner: Uuid::now_v7(),
        };
        assert_eq!(topic.to_string(), text);
    }
}
