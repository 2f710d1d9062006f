//! HTTP request handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use super::error::ApiResult;
use super::state::AppState;
use crate::presence::PresenceRecord;
use crate::user::{CreateUserRequest, User};
use crate::ws::Member;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /api/health
///
/// 503 once the hub has stopped.
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.hub.ensure_running()?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse<T> {
    pub users: Vec<T>,
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = state.users.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

/// GET /api/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UsersResponse<User>>> {
    let users = state.users.list_users().await?;
    Ok(Json(UsersResponse { users }))
}

/// GET /api/users/active
///
/// Members currently registered with the hub.
pub async fn active_users(State(state): State<AppState>) -> ApiResult<Json<UsersResponse<Member>>> {
    state.hub.ensure_running()?;
    Ok(Json(UsersResponse {
        users: state.hub.active_members(),
    }))
}

/// GET /api/users/online
///
/// Unexpired presence records marked online.
pub async fn online_users(State(state): State<AppState>) -> Json<UsersResponse<PresenceRecord>> {
    Json(UsersResponse {
        users: state.presence.online_users(),
    })
}
