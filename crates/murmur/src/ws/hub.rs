//! WebSocket hub for managing chat members and broadcasting messages.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::ServerEvent;
use crate::chat::{ChatMessage, DEFAULT_HISTORY_LIMIT, History};
use crate::presence::PresenceNotifier;

/// Size of the hub's event intake.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Size of each session's outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Events a newcomer receives besides the replay: welcome, join notice and
/// member list. Its queue must hold the replay plus these.
pub const REGISTRATION_OVERHEAD: usize = 3;

/// Identifies one live connection.
pub type SessionId = Uuid;

/// Sending half of a session's outbound queue.
pub type OutboundSender = mpsc::Sender<ServerEvent>;

/// Receiving half of a session's outbound queue.
pub type OutboundReceiver = mpsc::Receiver<ServerEvent>;

/// Identity a connection announced when it was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: String,
    pub username: String,
}

impl Member {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

/// The hub's handle on a session: who it is and where to deliver.
///
/// The hub never owns the connection. Dropping the handle closes the
/// session's outbound queue, which is the only signal its writer listens to.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    member: Member,
    outbound: OutboundSender,
}

impl SessionHandle {
    /// Create a handle with a fresh outbound queue of `capacity` slots.
    pub fn new(member: Member, capacity: usize) -> (Self, OutboundReceiver) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: Uuid::new_v4(),
            member,
            outbound,
        };
        (handle, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn member(&self) -> &Member {
        &self.member
    }
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Number of user messages replayed to new members.
    pub history_limit: usize,
    /// Pending events the intake holds before submitters wait.
    pub event_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Errors returned to hub submitters.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub control loop is not running")]
    Closed,
}

#[derive(Debug)]
enum HubEvent {
    Register(SessionHandle),
    Unregister(SessionId),
    Broadcast(Arc<ChatMessage>),
}

#[derive(Debug)]
struct RegisteredSession {
    member: Member,
    outbound: OutboundSender,
    active: bool,
}

type Registry = DashMap<SessionId, RegisteredSession>;

/// Cloneable front door to the hub.
///
/// Mutations are submitted as events; reads are snapshots of the registry.
#[derive(Debug, Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
    registry: Arc<Registry>,
}

impl HubHandle {
    /// Add a session. A session must be registered at most once.
    pub async fn register(&self, session: SessionHandle) -> Result<(), HubError> {
        self.submit(HubEvent::Register(session)).await
    }

    /// Remove a session. Unknown ids are ignored by the hub.
    pub async fn unregister(&self, session_id: SessionId) -> Result<(), HubError> {
        self.submit(HubEvent::Unregister(session_id)).await
    }

    /// Deliver a message to every member. User messages enter the history.
    pub async fn broadcast(&self, message: ChatMessage) -> Result<(), HubError> {
        self.submit(HubEvent::Broadcast(Arc::new(message))).await
    }

    /// Members that completed registration, sorted by username.
    pub fn active_members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .registry
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| entry.member.clone())
            .collect();
        members.sort_by(|a, b| a.username.cmp(&b.username).then_with(|| a.id.cmp(&b.id)));
        members
    }

    /// Whether the control loop is still accepting events.
    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }

    /// Fails with [`HubError::Closed`] once the control loop has stopped.
    pub fn ensure_running(&self) -> Result<(), HubError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(HubError::Closed)
        }
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_registered(&self, session_id: SessionId) -> bool {
        self.registry.contains_key(&session_id)
    }

    async fn submit(&self, event: HubEvent) -> Result<(), HubError> {
        self.events.send(event).await.map_err(|_| HubError::Closed)
    }
}

/// The control loop owning the registry's mutations and the history.
///
/// Every register, unregister and broadcast is processed here, one at a time,
/// in submission order.
pub struct Hub {
    events: mpsc::Receiver<HubEvent>,
    registry: Arc<Registry>,
    history: History,
    presence: Arc<dyn PresenceNotifier>,
}

impl Hub {
    /// Create a hub and its handle. The hub does nothing until [`Hub::run`].
    pub fn new(config: HubConfig, presence: Arc<dyn PresenceNotifier>) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(config.event_capacity.max(1));
        let registry = Arc::new(Registry::new());
        let hub = Self {
            events: rx,
            registry: Arc::clone(&registry),
            history: History::new(config.history_limit),
            presence,
        };
        let handle = HubHandle {
            events: tx,
            registry,
        };
        (hub, handle)
    }

    /// Create a hub and run it on a background task.
    pub fn spawn(config: HubConfig, presence: Arc<dyn PresenceNotifier>) -> HubHandle {
        let (hub, handle) = Self::new(config, presence);
        tokio::spawn(hub.run());
        handle
    }

    /// Process events until every [`HubHandle`] is dropped.
    pub async fn run(mut self) {
        info!(history_limit = self.history.limit(), "Hub started");
        while let Some(event) = self.events.recv().await {
            match event {
                HubEvent::Register(session) => self.register(session),
                HubEvent::Unregister(id) => self.unregister(id),
                HubEvent::Broadcast(message) => self.broadcast(message),
            }
        }
        info!("Hub stopped");
    }

    fn register(&mut self, session: SessionHandle) {
        let SessionHandle {
            id,
            member,
            outbound,
        } = session;
        debug_assert!(
            !self.registry.contains_key(&id),
            "session {id} registered twice"
        );

        info!(session_id = %id, user_id = %member.id, username = %member.username, "Registered session");
        self.registry.insert(
            id,
            RegisteredSession {
                member: member.clone(),
                outbound,
                active: false,
            },
        );

        // Welcome and replay go out before any later broadcast reaches this queue.
        let welcome = ServerEvent::Chat(Arc::new(ChatMessage::welcome(&member.username)));
        if !self.send_private(id, welcome) {
            return;
        }
        let replay: Vec<ServerEvent> = self
            .history
            .iter()
            .map(|msg| ServerEvent::Chat(Arc::clone(msg)))
            .collect();
        for event in replay {
            if !self.send_private(id, event) {
                return;
            }
        }

        if let Some(mut entry) = self.registry.get_mut(&id) {
            entry.active = true;
        }
        self.presence.notify(&member.id, &member.username, true);

        self.broadcast(Arc::new(ChatMessage::joined(&member.username)));
        self.publish_members();
    }

    fn unregister(&mut self, id: SessionId) {
        // Dropping the removed entry closes the session's outbound queue.
        let Some((_, session)) = self.registry.remove(&id) else {
            debug!(session_id = %id, "Unregister for unknown session ignored");
            return;
        };

        let member = session.member;
        info!(session_id = %id, username = %member.username, "Unregistered session");
        if !session.active {
            return;
        }

        self.notify_offline(&member);
        self.broadcast(Arc::new(ChatMessage::left(&member.username)));
        self.publish_members();
    }

    fn broadcast(&mut self, message: Arc<ChatMessage>) {
        self.history.record(Arc::clone(&message));
        self.fan_out(ServerEvent::Chat(message));
    }

    fn publish_members(&mut self) {
        let event = self.members_event();
        self.fan_out(event);
    }

    fn members_event(&self) -> ServerEvent {
        let mut names: Vec<String> = self
            .registry
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| entry.member.username.clone())
            .collect();
        names.sort();
        ServerEvent::PresenceUpdate(names.into())
    }

    /// Offer `event` to every registered session without waiting.
    ///
    /// When a round evicts an active member, the survivors get one refreshed
    /// member list. Each extra round removes at least one session, so the loop
    /// ends.
    fn fan_out(&mut self, event: ServerEvent) {
        let mut event = event;
        while self.deliver(&event) {
            event = self.members_event();
        }
    }

    /// One delivery round. Returns whether an active member was evicted.
    fn deliver(&mut self, event: &ServerEvent) -> bool {
        let mut failed = Vec::new();
        for entry in self.registry.iter() {
            if let Err(err) = entry.outbound.try_send(event.clone()) {
                failed.push((*entry.key(), err));
            }
        }

        let mut evicted_active = false;
        for (id, err) in failed {
            evicted_active |= self.evict(id, &err);
        }
        evicted_active
    }

    /// Enqueue to one session; evicts it and returns false on failure.
    fn send_private(&mut self, id: SessionId, event: ServerEvent) -> bool {
        let result = match self.registry.get(&id) {
            Some(entry) => entry.outbound.try_send(event),
            None => return false,
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                self.evict(id, &err);
                false
            }
        }
    }

    /// Forced removal after a failed enqueue. Returns whether the session was
    /// active.
    ///
    /// Unlike unregister this never announces a leave.
    fn evict(&mut self, id: SessionId, err: &TrySendError<ServerEvent>) -> bool {
        let Some((_, session)) = self.registry.remove(&id) else {
            return false;
        };
        let member = session.member;
        match err {
            TrySendError::Full(_) => warn!(
                session_id = %id,
                username = %member.username,
                "Outbound queue full, evicting session"
            ),
            TrySendError::Closed(_) => debug!(
                session_id = %id,
                username = %member.username,
                "Outbound queue closed, evicting session"
            ),
        }
        if session.active {
            self.notify_offline(&member);
        }
        session.active
    }

    /// Report `member` offline unless another of its sessions is still active.
    fn notify_offline(&self, member: &Member) {
        let still_connected = self
            .registry
            .iter()
            .any(|entry| entry.active && entry.member.id == member.id);
        if !still_connected {
            self.presence.notify(&member.id, &member.username, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::NoopPresence;

    fn new_hub() -> (Hub, HubHandle) {
        Hub::new(HubConfig::default(), Arc::new(NoopPresence))
    }

    fn drain(rx: &mut OutboundReceiver) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn texts(events: &[ServerEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| e.as_chat().map(|m| m.text.clone()))
            .collect()
    }

    #[test]
    fn test_register_sends_welcome_then_join() {
        let (mut hub, handle) = new_hub();
        let (session, mut rx) = SessionHandle::new(Member::new("usr_a", "alice"), 16);
        let id = session.id();

        hub.register(session);

        assert!(handle.is_registered(id));
        let events = drain(&mut rx);
        assert_eq!(
            texts(&events),
            vec!["Welcome to the chat, alice!", "alice has joined the chat."]
        );
        assert!(matches!(events.last(), Some(ServerEvent::PresenceUpdate(m)) if m.len() == 1));
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let (mut hub, handle) = new_hub();
        hub.unregister(Uuid::new_v4());
        assert_eq!(handle.session_count(), 0);
    }

    #[test]
    fn test_unregister_closes_queue() {
        let (mut hub, _handle) = new_hub();
        let (session, mut rx) = SessionHandle::new(Member::new("usr_a", "alice"), 16);
        let id = session.id();
        hub.register(session);
        drain(&mut rx);

        hub.unregister(id);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_register_burst_fits_exactly() {
        let config = HubConfig {
            history_limit: 5,
            ..HubConfig::default()
        };
        let (mut hub, handle) = Hub::new(config, Arc::new(NoopPresence));
        for i in 0..5 {
            hub.broadcast(Arc::new(ChatMessage::user(i.to_string(), "usr_x", "x")));
        }

        let (session, mut rx) =
            SessionHandle::new(Member::new("usr_a", "alice"), 5 + REGISTRATION_OVERHEAD);
        let id = session.id();
        hub.register(session);

        assert!(handle.is_registered(id));
        assert_eq!(drain(&mut rx).len(), 5 + REGISTRATION_OVERHEAD);
    }

    #[test]
    fn test_history_overflow_on_register_evicts_silently() {
        let (mut hub, handle) = new_hub();
        for i in 0..10 {
            hub.broadcast(Arc::new(ChatMessage::user(i.to_string(), "usr_x", "x")));
        }

        let (watcher, mut watcher_rx) = SessionHandle::new(Member::new("usr_w", "walt"), 64);
        hub.register(watcher);
        drain(&mut watcher_rx);

        // Welcome plus ten replayed messages cannot fit in four slots.
        let (small, _small_rx) = SessionHandle::new(Member::new("usr_s", "sam"), 4);
        let small_id = small.id();
        hub.register(small);

        assert!(!handle.is_registered(small_id));
        assert!(drain(&mut watcher_rx).is_empty());
    }
}
