//! API route definitions.

use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, warn};

use super::handlers;
use super::state::AppState;
use crate::ws::handler::ws_handler;

/// Create the application router. All routes live under `/api`.
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let cors = build_cors_layer(cors_origins);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/users", post(handlers::create_user))
        .route("/users", get(handlers::list_users))
        .route("/users/active", get(handlers::active_users))
        .route("/users/online", get(handlers::online_users))
        .route("/ws/{user_id}", get(ws_handler))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(cors)
        .layer(trace_layer)
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("CORS: ignoring invalid origin {:?}", origin);
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        warn!("CORS: No origins configured, denying all cross-origin requests");
        return CorsLayer::new().allow_origin(AllowOrigin::exact(HeaderValue::from_static("null")));
    }

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60))
}
