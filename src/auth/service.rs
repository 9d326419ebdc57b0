use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::forms::{
    FormErrors, PasswordChangeForm, RegistrationForm, DUPLICATE_USERNAME, INCORRECT_OLD_PASSWORD,
};
use crate::auth::password::{self, PasswordPolicy};
use crate::auth::session::{generate_token, hash_token};
use crate::db::models::{User, UserSession};
use crate::db::store::{IdentityStore, SessionStore};
use crate::error::{AppError, DatabaseError};

/// Account and session operations on top of the identity and session stores.
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionStore>,
    policy: PasswordPolicy,
    session_ttl_hours: i64,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        policy: PasswordPolicy,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            identities,
            sessions,
            policy,
            session_ttl_hours,
        }
    }

    /// Creates the account, or returns the field errors that prevented it.
    pub async fn register(
        &self,
        form: &RegistrationForm,
    ) -> Result<Result<User, FormErrors>, AppError> {
        let mut errors = form.validate(&self.policy);
        let username = form.username();

        if !errors.has_errors("username")
            && self.identities.find_by_username(username).await?.is_some()
        {
            errors.add("username", DUPLICATE_USERNAME);
        }
        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        let password_hash = hash_blocking(form.password1.clone()).await?;
        match self.identities.create_user(&User::new(username.to_string(), password_hash)).await {
            Ok(user) => {
                info!(user_id = %user.id, username = %user.username, "Registered new account");
                Ok(Ok(user))
            }
            // Lost a race with a concurrent registration of the same name.
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                errors.add("username", DUPLICATE_USERNAME);
                Ok(Err(errors))
            }
            Err(e) => Err(e),
        }
    }

    /// The matching active account, or `None` for an unknown user, a wrong
    /// password, or an inactive account.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        let Some(user) = self.identities.find_by_username(username).await? else {
            let password = password.to_string();
            tokio::task::spawn_blocking(move || password::verify_dummy(&password)).await?;
            debug!(username, "Login attempt for unknown account");
            return Ok(None);
        };

        if !verify_blocking(user.password_hash.clone(), password.to_string()).await? {
            debug!(user_id = %user.id, "Login attempt with wrong password");
            return Ok(None);
        }
        if !user.is_active {
            warn!(user_id = %user.id, "Login attempt for inactive account");
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Issues a new session for `user` and returns its raw token. Any session
    /// the request already carried is destroyed first.
    pub async fn start_session(
        &self,
        user: &User,
        previous_token: Option<&str>,
    ) -> Result<String, AppError> {
        if let Some(previous) = previous_token {
            if self.sessions.delete_session(&hash_token(previous)).await? {
                debug!(user_id = %user.id, "Rotated existing session on login");
            }
        }

        let token = generate_token();
        let session = UserSession::new(user.id, hash_token(&token), self.session_ttl_hours);
        self.sessions.create_session(&session).await?;
        self.identities.record_login(user.id).await?;

        info!(user_id = %user.id, session_id = %session.id, "Session established");
        Ok(token)
    }

    /// The active account bound to `token`, if any.
    pub async fn resolve_session(&self, token: &str) -> Result<Option<User>, AppError> {
        let token_hash = hash_token(token);
        let Some(session) = self.sessions.get_session(&token_hash).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            self.sessions.delete_session(&token_hash).await?;
            debug!(session_id = %session.id, "Dropped expired session");
            return Ok(None);
        }

        match self.identities.find_by_id(session.user_id).await? {
            Some(user) if user.is_active => {
                self.sessions.touch_session(&token_hash).await?;
                Ok(Some(user))
            }
            _ => Ok(None),
        }
    }

    pub async fn end_session(&self, token: &str) -> Result<bool, AppError> {
        self.sessions.delete_session(&hash_token(token)).await
    }

    /// Replaces the password and signs out every other session of the user.
    pub async fn change_password(
        &self,
        user: &User,
        current_token: &str,
        form: &PasswordChangeForm,
    ) -> Result<Result<(), FormErrors>, AppError> {
        let mut errors = form.validate(&self.policy, &user.username);

        if !form.old_password.is_empty()
            && !verify_blocking(user.password_hash.clone(), form.old_password.clone()).await?
        {
            errors.add("old_password", INCORRECT_OLD_PASSWORD);
        }
        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        let password_hash = hash_blocking(form.new_password1.clone()).await?;
        self.identities.update_password(user.id, &password_hash).await?;
        let revoked = self
            .sessions
            .delete_other_sessions(user.id, &hash_token(current_token))
            .await?;

        info!(user_id = %user.id, revoked, "Password changed");
        Ok(Ok(()))
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AppError> {
        self.sessions.purge_expired().await
    }
}

async fn hash_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password)).await?
}

async fn verify_blocking(hash: String, password: String) -> Result<bool, AppError> {
    Ok(tokio::task::spawn_blocking(move || password::verify_password(&hash, &password)).await?)
}
