//! WebSocket message types.
//!
//! These types define the JSON protocol between browser clients and the relay.
//! Every frame is an object tagged by `kind`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::{ChatMessage, MessageKind};

// ============================================================================
// Events (Server -> Client)
// ============================================================================

/// An item on a session's outbound queue.
///
/// Payloads are reference counted so one broadcast is shared by every queue it
/// lands on.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A user or system chat message.
    Chat(Arc<ChatMessage>),
    /// Display names of the current members.
    PresenceUpdate(Arc<[String]>),
}

impl ServerEvent {
    /// Serialize to the JSON text carried in a frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&Envelope::from(self))
    }

    /// The chat message carried by this event, if any.
    pub fn as_chat(&self) -> Option<&ChatMessage> {
        match self {
            ServerEvent::Chat(msg) => Some(msg),
            ServerEvent::PresenceUpdate(_) => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Envelope<'a> {
    UserMessage {
        id: &'a str,
        text: &'a str,
        author_id: &'a str,
        author_name: &'a str,
        timestamp: DateTime<Utc>,
    },
    System {
        id: &'a str,
        text: &'a str,
        timestamp: DateTime<Utc>,
    },
    PresenceUpdate {
        members: &'a [String],
    },
}

impl<'a> From<&'a ServerEvent> for Envelope<'a> {
    fn from(event: &'a ServerEvent) -> Self {
        match event {
            ServerEvent::Chat(msg) => match msg.kind {
                MessageKind::User => Envelope::UserMessage {
                    id: &msg.id,
                    text: &msg.text,
                    author_id: &msg.author_id,
                    author_name: &msg.author_name,
                    timestamp: msg.timestamp,
                },
                MessageKind::System => Envelope::System {
                    id: &msg.id,
                    text: &msg.text,
                    timestamp: msg.timestamp,
                },
            },
            ServerEvent::PresenceUpdate(members) => Envelope::PresenceUpdate {
                members: &members[..],
            },
        }
    }
}

// ============================================================================
// Commands (Client -> Server)
// ============================================================================

/// Kinds a client may send. Only chat text is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    #[default]
    UserMessage,
}

/// Frame sent by a client. A missing `kind` means `user_message`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    #[serde(default)]
    pub kind: ClientKind,
    pub text: String,
}

/// Why an inbound frame was dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message text is empty")]
    EmptyText,
}

/// Decode an inbound text frame into the chat text it carries.
pub fn decode_client_text(raw: &str) -> Result<String, DecodeError> {
    let envelope: ClientEnvelope = serde_json::from_str(raw)?;
    match envelope.kind {
        ClientKind::UserMessage if envelope.text.trim().is_empty() => Err(DecodeError::EmptyText),
        ClientKind::UserMessage => Ok(envelope.text),
    }
}
