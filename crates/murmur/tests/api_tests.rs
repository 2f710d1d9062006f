//! API integration tests.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use std::sync::Arc;

use murmur::api::AppState;
use murmur::presence::{PresenceCache, PresenceNotifier};
use murmur::ws::{Hub, HubConfig, SessionConfig};
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::{create_user, router, test_app, test_state, test_users};

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri).method(method);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, json) = send(test_app().await, Method::GET, "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_create_then_list_users() {
    let state = test_state().await;

    let (status, json) = send(
        router(state.clone()),
        Method::POST,
        "/api/users",
        Some(json!({ "username": "  alice  " })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user"]["username"], "alice");
    let id = json["user"]["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("usr_"));

    let (status, json) = send(router(state), Method::GET, "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    let users = json["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], id.as_str());
}

#[tokio::test]
async fn test_create_user_rejects_blank_name() {
    let (status, json) = send(
        test_app().await,
        Method::POST,
        "/api/users",
        Some(json!({ "username": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_create_user_rejects_long_name() {
    let (status, _) = send(
        test_app().await,
        Method::POST,
        "/api/users",
        Some(json!({ "username": "x".repeat(33) })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_user_duplicate_conflicts() {
    let state = test_state().await;
    create_user(&state, "alice").await;

    let (status, json) = send(
        router(state),
        Method::POST,
        "/api/users",
        Some(json!({ "username": "alice" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn test_active_users_empty_without_connections() {
    let state = test_state().await;
    create_user(&state, "alice").await;

    let (status, json) = send(router(state), Method::GET, "/api/users/active", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["users"], json!([]));
}

#[tokio::test]
async fn test_online_users_reflect_presence() {
    let state = test_state().await;
    state.presence.notify("usr_b", "bob", true);
    state.presence.notify("usr_a", "alice", true);
    state.presence.notify("usr_c", "carol", false);

    let (status, json) = send(router(state), Method::GET, "/api/users/online", None).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice", "bob"]);
    assert_eq!(json["users"][0]["is_online"], true);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (status, _) = send(test_app().await, Method::GET, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stopped_hub_reports_unavailable() {
    let presence = Arc::new(PresenceCache::default());
    let (hub, handle) = Hub::new(HubConfig::default(), presence.clone());
    drop(hub);
    let state = AppState::new(test_users().await, handle, presence, SessionConfig::default());

    let (status, json) = send(router(state.clone()), Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");

    let (status, _) = send(router(state), Method::GET, "/api/users/active", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
