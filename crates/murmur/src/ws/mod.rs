//! WebSocket hub and per-connection sessions.
//!
//! The hub is the single authority over membership and history. Sessions talk
//! to it only by submitting events through a [`HubHandle`].

pub mod handler;
pub mod hub;
pub mod session;
pub mod types;

pub use hub::{
    Hub, HubConfig, HubError, HubHandle, Member, OutboundReceiver, REGISTRATION_OVERHEAD,
    SessionHandle, SessionId,
};
pub use session::SessionConfig;
pub use types::{ServerEvent, decode_client_text};
