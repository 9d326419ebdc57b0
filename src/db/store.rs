use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{User, UserSession};
use crate::error::AppError;

/// Persistent account records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Fails with `DatabaseError::Duplicate` when the username is taken.
    async fn create_user(&self, user: &User) -> Result<User, AppError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;

    async fn record_login(&self, id: Uuid) -> Result<(), AppError>;
}

/// Server-side sessions, keyed by token digest.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &UserSession) -> Result<UserSession, AppError>;

    async fn get_session(&self, token_hash: &str) -> Result<Option<UserSession>, AppError>;

    async fn touch_session(&self, token_hash: &str) -> Result<(), AppError>;

    /// Returns whether a session was removed.
    async fn delete_session(&self, token_hash: &str) -> Result<bool, AppError>;

    /// Removes every session of `user_id` except the one whose digest is `keep`.
    async fn delete_other_sessions(&self, user_id: Uuid, keep: &str) -> Result<u64, AppError>;

    async fn purge_expired(&self) -> Result<u64, AppError>;
}
