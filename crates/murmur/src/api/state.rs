//! Application state shared across handlers.

use std::sync::Arc;

use crate::presence::PresenceCache;
use crate::user::UserService;
use crate::ws::{HubHandle, SessionConfig};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registered users; also the directory consulted at connect time.
    pub users: UserService,
    /// Front door to the chat hub.
    pub hub: HubHandle,
    /// Recently seen users, fed by the hub.
    pub presence: Arc<PresenceCache>,
    /// Limits applied to each accepted WebSocket.
    pub session: SessionConfig,
}

impl AppState {
    pub fn new(
        users: UserService,
        hub: HubHandle,
        presence: Arc<PresenceCache>,
        session: SessionConfig,
    ) -> Self {
        Self {
            users,
            hub,
            presence,
            session,
        }
    }
}
