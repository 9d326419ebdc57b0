use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::{User, UserSession};
use crate::db::store::{IdentityStore, SessionStore};
use crate::error::AppError;

const USER_COLUMNS: &str = "id, username, password_hash, is_active, date_joined, last_login";
const SESSION_COLUMNS: &str = "id, user_id, token_hash, expires_at, created_at, last_activity";

/// PostgreSQL-backed identity and session store.
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub async fn get_pool_status(&self) -> DbPoolStatus {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;

        DbPoolStatus {
            total_connections: size,
            active_connections: size.saturating_sub(idle),
            idle_connections: idle,
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        Ok(self.pool.as_ref().begin().await?)
    }

    async fn create_user_with_transaction(
        &self,
        user: &User,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<User, AppError> {
        let query = format!(
            "INSERT INTO users ({cols}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {cols}",
            cols = USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.is_active)
            .bind(user.date_joined)
            .bind(user.last_login)
            .fetch_one(&mut **transaction)
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn create_user(&self, user: &User) -> Result<User, AppError> {
        let mut transaction = self.begin_transaction().await?;

        match self.create_user_with_transaction(user, &mut transaction).await {
            Ok(user) => {
                transaction.commit().await?;
                Ok(user)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }
        Ok(())
    }

    async fn record_login(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, session: &UserSession) -> Result<UserSession, AppError> {
        let query = format!(
            "INSERT INTO user_sessions ({cols}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {cols}",
            cols = SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, UserSession>(&query)
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.token_hash)
            .bind(session.expires_at)
            .bind(session.created_at)
            .bind(session.last_activity)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(session)
    }

    async fn get_session(&self, token_hash: &str) -> Result<Option<UserSession>, AppError> {
        let query = format!("SELECT {} FROM user_sessions WHERE token_hash = $1", SESSION_COLUMNS);
        let session = sqlx::query_as::<_, UserSession>(&query)
            .bind(token_hash)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(session)
    }

    async fn touch_session(&self, token_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE user_sessions SET last_activity = $1 WHERE token_hash = $2")
            .bind(Utc::now())
            .bind(token_hash)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_other_sessions(&self, user_id: Uuid, keep: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM user_sessions WHERE user_id = $1 AND token_hash <> $2",
        )
        .bind(user_id)
        .bind(keep)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                debug!("Purged {} expired sessions", result.rows_affected());
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbPoolStatus {
    pub total_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
}
