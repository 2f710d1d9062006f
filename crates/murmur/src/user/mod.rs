//! User registration and lookup.

mod models;
mod repository;
mod service;

pub use models::{CreateUserRequest, User};
pub use repository::UserRepository;
pub use service::{DirectoryError, MAX_USERNAME_CHARS, UserDirectory, UserService};
