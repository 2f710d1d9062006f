//! Chat messages and the recent-history ring.

pub mod history;
pub mod message;

pub use history::{DEFAULT_HISTORY_LIMIT, History};
pub use message::{ChatMessage, MessageKind};
