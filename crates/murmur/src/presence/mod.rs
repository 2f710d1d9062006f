//! Presence tracking.
//!
//! The hub reports joins and leaves through [`PresenceNotifier`]. Notification
//! is fire-and-forget: implementations must not block and cannot fail.

mod cache;

pub use cache::{DEFAULT_PRESENCE_TTL_SECS, PresenceCache, PresenceRecord};

/// Receives online/offline transitions from the hub.
pub trait PresenceNotifier: Send + Sync {
    fn notify(&self, user_id: &str, username: &str, online: bool);
}

/// Discards all notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPresence;

impl PresenceNotifier for NoopPresence {
    fn notify(&self, _user_id: &str, _username: &str, _online: bool) {}
}
