//! Persisted record types.

pub mod entry;
pub mod topic;
pub mod user;

pub use self::entry::{Entry, NewEntry};
pub use self::topic::{NewTopic, Topic};
pub use self::user::{NewAccount, User};
