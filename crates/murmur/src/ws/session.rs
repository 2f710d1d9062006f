//! Per-connection session: an inbound pump feeding the hub and an outbound
//! pump draining the session's queue onto the socket.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::time::{Instant, interval_at, timeout};
use tracing::{debug, info, warn};

use super::hub::{DEFAULT_OUTBOUND_CAPACITY, HubHandle, Member, OutboundReceiver, SessionHandle, SessionId};
use super::types::{ServerEvent, decode_client_text};
use crate::chat::ChatMessage;

/// Maximum inbound message size in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512;

/// Time allowed to read the next frame (including pongs) from the peer.
pub const DEFAULT_PONG_WAIT_SECS: u64 = 60;

/// Time allowed to write a frame to the peer.
pub const DEFAULT_WRITE_WAIT_SECS: u64 = 10;

/// Connection limits and deadlines.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_message_size: usize,
    pub outbound_capacity: usize,
    pub pong_wait: Duration,
    pub write_wait: Duration,
}

impl SessionConfig {
    /// Keepalive period, shorter than the peer's read deadline.
    pub fn ping_period(&self) -> Duration {
        (self.pong_wait * 9 / 10).max(Duration::from_millis(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            pong_wait: Duration::from_secs(DEFAULT_PONG_WAIT_SECS),
            write_wait: Duration::from_secs(DEFAULT_WRITE_WAIT_SECS),
        }
    }
}

/// Drive one upgraded connection until either pump stops.
///
/// Registers with the hub, runs both pumps, then submits exactly one
/// unregister.
pub async fn run_session(socket: WebSocket, hub: HubHandle, member: Member, config: SessionConfig) {
    let (sender, receiver) = socket.split();
    let (session, outbound) = SessionHandle::new(member.clone(), config.outbound_capacity);
    let session_id = session.id();

    if let Err(e) = hub.register(session).await {
        warn!(username = %member.username, "Failed to register session: {}", e);
        return;
    }

    let mut write_task = tokio::spawn(write_pump(sender, outbound, session_id, config.clone()));

    tokio::select! {
        _ = read_pump(receiver, &hub, session_id, &member, &config) => {}
        _ = &mut write_task => {
            debug!(session_id = %session_id, "Writer stopped before reader");
        }
    }

    if let Err(e) = hub.unregister(session_id).await {
        warn!(session_id = %session_id, "Failed to unregister session: {}", e);
    }

    // The hub closes the queue on unregister; give the writer a moment to
    // flush and say goodbye.
    if !write_task.is_finished() && timeout(config.write_wait, &mut write_task).await.is_err() {
        write_task.abort();
    }
    info!(session_id = %session_id, username = %member.username, "WebSocket connection closed");
}

/// Read frames and forward chat text to the hub.
async fn read_pump(
    mut receiver: SplitStream<WebSocket>,
    hub: &HubHandle,
    session_id: SessionId,
    member: &Member,
    config: &SessionConfig,
) {
    loop {
        // Each read gets a fresh deadline, so any frame (pongs included)
        // keeps the connection alive.
        let msg = match timeout(config.pong_wait, receiver.next()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => {
                warn!(session_id = %session_id, "WebSocket error: {}", e);
                return;
            }
            Ok(None) => return,
            Err(_) => {
                info!(session_id = %session_id, "Read deadline expired");
                return;
            }
        };

        match msg {
            Message::Text(text) => match decode_client_text(text.as_str()) {
                Ok(body) => {
                    let message = ChatMessage::user(body, member.id.as_str(), member.username.as_str());
                    if hub.broadcast(message).await.is_err() {
                        warn!(session_id = %session_id, "Hub closed, dropping connection");
                        return;
                    }
                }
                Err(e) => {
                    warn!(session_id = %session_id, username = %member.username, "Dropping inbound frame: {}", e);
                }
            },
            Message::Binary(_) => {
                debug!(session_id = %session_id, "Received binary message, ignoring");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                info!(session_id = %session_id, username = %member.username, "Client closed WebSocket connection");
                return;
            }
        }
    }
}

/// Drain the outbound queue onto the socket and keep the peer alive.
async fn write_pump(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: OutboundReceiver,
    session_id: SessionId,
    config: SessionConfig,
) {
    let period = config.ping_period();
    let mut ping = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            event = outbound.recv() => {
                let Some(event) = event else {
                    // Queue closed by the hub.
                    let _ = timeout(config.write_wait, sender.send(Message::Close(None))).await;
                    return;
                };
                let frame = coalesce(event, &mut outbound);
                if frame.is_empty() {
                    continue;
                }
                if !send_frame(&mut sender, Message::Text(frame.into()), session_id, config.write_wait).await {
                    return;
                }
            }
            _ = ping.tick() => {
                if !send_frame(&mut sender, Message::Ping(Default::default()), session_id, config.write_wait).await {
                    return;
                }
            }
        }
    }
}

/// Serialize `first` plus whatever is already queued into one
/// newline-separated frame.
fn coalesce(first: ServerEvent, outbound: &mut OutboundReceiver) -> String {
    let mut frame = String::new();
    append_event(&mut frame, &first);
    for _ in 0..outbound.len() {
        match outbound.try_recv() {
            Ok(event) => append_event(&mut frame, &event),
            Err(_) => break,
        }
    }
    frame
}

fn append_event(frame: &mut String, event: &ServerEvent) {
    match event.to_json() {
        Ok(json) => {
            if !frame.is_empty() {
                frame.push('\n');
            }
            frame.push_str(&json);
        }
        Err(e) => warn!("Failed to serialize event: {}", e),
    }
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: Message,
    session_id: SessionId,
    write_wait: Duration,
) -> bool {
    match timeout(write_wait, sender.send(msg)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(session_id = %session_id, "Write failed: {}", e);
            false
        }
        Err(_) => {
            warn!(session_id = %session_id, "Write deadline exceeded");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[test]
    fn test_ping_period_shorter_than_pong_wait() {
        let config = SessionConfig::default();
        assert_eq!(config.ping_period(), Duration::from_secs(54));
        assert!(config.ping_period() < config.pong_wait);
    }

    #[test]
    fn test_coalesce_joins_queued_events() {
        let (tx, mut rx) = mpsc::channel(8);
        for text in ["two", "three"] {
            tx.try_send(ServerEvent::Chat(Arc::new(ChatMessage::user(text, "u", "n"))))
                .unwrap();
        }
        let first = ServerEvent::Chat(Arc::new(ChatMessage::user("one", "u", "n")));

        let frame = coalesce(first, &mut rx);
        let texts: Vec<String> = frame
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["text"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert!(rx.try_recv().is_err());
    }
}
