use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered account. `password_hash` is a PHC string and never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password_hash,
            is_active: true,
            date_joined: Utc::now(),
            last_login: None,
        }
    }
}

/// Server-side half of a login session. The browser holds the raw token,
/// the store only ever sees its digest.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: Uuid, token_hash: String, expires_in_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            expires_at: now + chrono::Duration::hours(expires_in_hours),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_skips_password_hash() {
        let user = User::new("alice".to_string(), "$argon2id$v=19$secret".to_string());
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["username"], "alice");
        assert_eq!(json["is_active"], true);
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_session_expiry() {
        let session = UserSession::new(Uuid::new_v4(), "digest".to_string(), 1);
        assert!(!session.is_expired());

        let mut stale = session.clone();
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        assert!(stale.is_expired());
    }
}
