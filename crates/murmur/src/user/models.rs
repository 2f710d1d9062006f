//! User data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered chat user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

/// Request to register a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}
