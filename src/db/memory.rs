use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{User, UserSession};
use crate::db::store::{IdentityStore, SessionStore};
use crate::error::{AppError, DatabaseError};

/// Process-local store for tests and single-instance demos. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    sessions: Arc<RwLock<HashMap<String, UserSession>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn set_active(&self, user_id: Uuid, active: bool) {
        if let Some(user) = self.users.write().await.get_mut(&user_id) {
            user.is_active = active;
        }
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create_user(&self, user: &User) -> Result<User, AppError> {
        // Uniqueness check and insert happen under one write lock.
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == user.username) || users.contains_key(&user.id) {
            return Err(DatabaseError::Duplicate.into());
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(DatabaseError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn record_login(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create_session(&self, session: &UserSession) -> Result<UserSession, AppError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.token_hash) {
            return Err(DatabaseError::Duplicate.into());
        }
        sessions.insert(session.token_hash.clone(), session.clone());
        Ok(session.clone())
    }

    async fn get_session(&self, token_hash: &str) -> Result<Option<UserSession>, AppError> {
        Ok(self.sessions.read().await.get(token_hash).cloned())
    }

    async fn touch_session(&self, token_hash: &str) -> Result<(), AppError> {
        if let Some(session) = self.sessions.write().await.get_mut(token_hash) {
            session.last_activity = Utc::now();
        }
        Ok(())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, AppError> {
        Ok(self.sessions.write().await.remove(token_hash).is_some())
    }

    async fn delete_other_sessions(&self, user_id: Uuid, keep: &str) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|hash, s| s.user_id != user_id || hash == keep);
        Ok((before - sessions.len()) as u64)
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}
