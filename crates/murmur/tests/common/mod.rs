//! Test utilities and common setup.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use murmur::api::{AppState, create_router};
use murmur::db::Database;
use murmur::presence::PresenceCache;
use murmur::user::{CreateUserRequest, User, UserRepository, UserService};
use murmur::ws::{Hub, HubConfig, SessionConfig};
use tokio::net::TcpListener;

/// How long a test waits for an expected event before failing.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// User service over a fresh in-memory database.
pub async fn test_users() -> UserService {
    let db = Database::in_memory()
        .await
        .expect("Failed to create test database");
    UserService::new(UserRepository::new(db.pool().clone()))
}

/// Build application state over an in-memory database and a running hub.
pub async fn test_state() -> AppState {
    test_state_with(SessionConfig::default()).await
}

/// Like [`test_state`] with custom connection limits and deadlines.
pub async fn test_state_with(session: SessionConfig) -> AppState {
    let presence = Arc::new(PresenceCache::default());
    let hub = Hub::spawn(HubConfig::default(), presence.clone());

    AppState::new(test_users().await, hub, presence, session)
}

/// Create a test application router.
pub async fn test_app() -> Router {
    router(test_state().await)
}

pub fn router(state: AppState) -> Router {
    create_router(state, &["http://localhost:3000".to_string()])
}

/// Serve `state` on an ephemeral local port.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener address");
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server failed");
    });
    addr
}

pub async fn create_user(state: &AppState, username: &str) -> User {
    state
        .users
        .create_user(CreateUserRequest {
            username: username.to_string(),
        })
        .await
        .expect("Failed to create test user")
}
