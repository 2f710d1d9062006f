//! Chat message value type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author id used for hub-generated messages.
pub const SYSTEM_AUTHOR_ID: &str = "system";

/// Author name used for hub-generated messages.
pub const SYSTEM_AUTHOR_NAME: &str = "System";

/// Whether a message was written by a member or synthesized by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    System,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::User => write!(f, "user"),
            MessageKind::System => write!(f, "system"),
        }
    }
}

/// An immutable chat message.
///
/// Ids are UUID v4 strings generated at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author_name: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
}

impl ChatMessage {
    /// Create a message authored by a member.
    pub fn user(
        text: impl Into<String>,
        author_id: impl Into<String>,
        author_name: impl Into<String>,
    ) -> Self {
        Self::new(text.into(), author_id.into(), author_name.into(), MessageKind::User)
    }

    /// Create a hub notice (welcome, join, leave).
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(
            text.into(),
            SYSTEM_AUTHOR_ID.to_string(),
            SYSTEM_AUTHOR_NAME.to_string(),
            MessageKind::System,
        )
    }

    fn new(text: String, author_id: String, author_name: String, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            author_id,
            author_name,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn is_user(&self) -> bool {
        self.kind == MessageKind::User
    }

    pub fn welcome(display_name: &str) -> Self {
        Self::system(format!("Welcome to the chat, {display_name}!"))
    }

    pub fn joined(display_name: &str) -> Self {
        Self::system(format!("{display_name} has joined the chat."))
    }

    pub fn left(display_name: &str) -> Self {
        Self::system(format!("{display_name} has left the chat."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_user_message_fields() {
        let msg = ChatMessage::user("hi", "usr_1", "bob");
        assert_eq!(msg.text, "hi");
        assert_eq!(msg.author_id, "usr_1");
        assert_eq!(msg.author_name, "bob");
        assert!(msg.is_user());
    }

    #[test]
    fn test_system_message_author() {
        let msg = ChatMessage::joined("bob");
        assert_eq!(msg.kind, MessageKind::System);
        assert_eq!(msg.author_id, SYSTEM_AUTHOR_ID);
        assert_eq!(msg.author_name, SYSTEM_AUTHOR_NAME);
        assert_eq!(msg.text, "bob has joined the chat.");
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<String> = (0..1000)
            .map(|i| ChatMessage::user(i.to_string(), "u", "n").id)
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(MessageKind::User.to_string(), "user");
        assert_eq!(MessageKind::System.to_string(), "system");
    }
}
