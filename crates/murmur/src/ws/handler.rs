//! WebSocket handler for client connections.

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};
use tracing::info;

use super::hub::Member;
use super::session::run_session;
use crate::api::{ApiError, AppState};
use crate::user::UserDirectory;

/// WebSocket upgrade handler.
///
/// GET /api/ws/{user_id}
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user = state.users.resolve(&user_id).await?;
    info!(user_id = %user.id, username = %user.username, "WebSocket upgrade request");

    let member = Member::new(user.id, user.username);
    let hub = state.hub.clone();
    let config = state.session.clone();

    Ok(ws
        .max_message_size(config.max_message_size)
        .max_frame_size(config.max_message_size)
        .on_upgrade(move |socket| run_session(socket, hub, member, config)))
}
