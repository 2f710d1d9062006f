//! User repository for database operations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::User;

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn generate_id() -> String {
        format!("usr_{}", nanoid::nanoid!(12))
    }

    /// Insert a user. Callers validate the username first.
    #[instrument(skip(self))]
    pub async fn create(&self, username: &str) -> Result<User> {
        let id = Self::generate_id();
        debug!("Creating user: {} ({})", username, id);

        sqlx::query("INSERT INTO users (id, username) VALUES (?, ?)")
            .bind(&id)
            .bind(username)
            .execute(&self.pool)
            .await
            .context("Failed to insert user")?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by username")?;

        Ok(user)
    }

    /// All users, oldest first.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, created_at FROM users ORDER BY created_at, username",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        Ok(users)
    }

    pub async fn is_username_available(&self, username: &str) -> Result<bool> {
        Ok(self.get_by_username(username).await?.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn repo() -> UserRepository {
        let db = Database::in_memory().await.unwrap();
        UserRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = repo().await;
        let user = repo.create("alice").await.unwrap();

        assert!(user.id.starts_with("usr_"));
        assert_eq!(user.username, "alice");
        assert_eq!(repo.get(&user.id).await.unwrap(), Some(user));
        assert!(repo.get("usr_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_username_unique() {
        let repo = repo().await;
        repo.create("alice").await.unwrap();

        assert!(!repo.is_username_available("alice").await.unwrap());
        assert!(repo.create("alice").await.is_err());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
