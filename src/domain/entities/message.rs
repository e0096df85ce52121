use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message, local or remote.
///
/// The id is a v7 UUID, so it is time-ordered and unique within a store
/// instance. Participants are identified by display name only; two users
/// may share a sender string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            sender: sender.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct() {
        let a = Message::new("alice", "hi");
        let b = Message::new("alice", "hi");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn wire_form_keeps_field_names() {
        let msg = Message::new("bob", "hello");
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("id").is_some());
        assert_eq!(value["sender"], "bob");
        assert_eq!(value["text"], "hello");
        assert!(value.get("timestamp").is_some());
    }
}
