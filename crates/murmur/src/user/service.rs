//! User registration and identity lookup.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument};

use super::models::{CreateUserRequest, User};
use super::repository::UserRepository;

/// Longest accepted username, in characters.
pub const MAX_USERNAME_CHARS: usize = 32;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error(
        "Invalid username: must be 1-{} characters without control characters",
        MAX_USERNAME_CHARS
    )]
    InvalidUsername,

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("User storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Resolves the identifier a client connects with to a display identity.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve(&self, id: &str) -> Result<User, DirectoryError>;
}

/// Service for user registration.
#[derive(Debug, Clone)]
pub struct UserService {
    repo: UserRepository,
}

impl UserService {
    pub fn new(repo: UserRepository) -> Self {
        Self { repo }
    }

    /// Register a user after validating and trimming the name.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, DirectoryError> {
        let username = request.username.trim();
        if !is_valid_username(username) {
            return Err(DirectoryError::InvalidUsername);
        }
        if !self.repo.is_username_available(username).await? {
            return Err(DirectoryError::UsernameTaken(username.to_string()));
        }

        let user = self.repo.create(username).await?;
        info!(user_id = %user.id, username = %user.username, "Created new user");
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, DirectoryError> {
        Ok(self.repo.list().await?)
    }
}

#[async_trait]
impl UserDirectory for UserService {
    async fn resolve(&self, id: &str) -> Result<User, DirectoryError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }
}

fn is_valid_username(username: &str) -> bool {
    let chars = username.chars().count();
    (1..=MAX_USERNAME_CHARS).contains(&chars) && !username.chars().any(char::is_control)
}
