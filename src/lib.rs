pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod render;
pub mod routes;

use std::sync::Arc;
use actix_web::cookie::Key;
use actix_web::HttpResponse;
use sha2::{Digest, Sha512};

pub use error::AppError;
pub use config::Settings;

pub use auth::{AuthService, PasswordPolicy};
pub use db::{IdentityStore, InMemoryStore, PgStore, SessionStore, User, UserSession};
pub use render::{JsonRenderer, Renderer};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth_service: Arc<AuthService>,
    pub renderer: Arc<dyn Renderer>,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(
        config: Settings,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let auth_service = AuthService::new(
            identities,
            sessions,
            PasswordPolicy::new(config.auth.password_min_length),
            config.session.ttl_hours,
        );

        Self {
            cookie_key: derive_cookie_key(&config.session.secret_key),
            config: Arc::new(config),
            auth_service: Arc::new(auth_service),
            renderer: Arc::new(JsonRenderer),
        }
    }

    /// State backed by a fresh [`InMemoryStore`].
    pub fn in_memory(config: Settings) -> (Self, InMemoryStore) {
        let store = InMemoryStore::new();
        let state = Self::new(config, Arc::new(store.clone()), Arc::new(store.clone()));
        (state, store)
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }
}

fn derive_cookie_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}
