//! HTTP API module.
//!
//! Provides user registration, member queries and the WebSocket endpoint.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
