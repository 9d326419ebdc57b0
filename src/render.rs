//! Page rendering seam.
//!
//! Handlers describe a page as a template name plus a context mapping; a
//! `Renderer` turns that into a response. The bundled `JsonRenderer` answers
//! with the context itself, which suits API clients and tests. Hosts that
//! serve HTML plug in their own template engine.

use actix_web::HttpResponse;
use serde_json::{Map, Value};

use crate::auth::messages::StatusMessage;
use crate::error::AppError;

pub const REGISTER_TEMPLATE: &str = "users/register.html";
pub const LOGIN_TEMPLATE: &str = "users/login.html";
pub const PROFILE_TEMPLATE: &str = "users/profile.html";
pub const DASHBOARD_TEMPLATE: &str = "users/dashboard.html";
pub const PASSWORD_CHANGE_TEMPLATE: &str = "users/password_change.html";

#[derive(Debug, Clone)]
pub struct Page {
    pub template: &'static str,
    pub context: Map<String, Value>,
}

impl Page {
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            context: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    pub fn with_messages(self, messages: Vec<StatusMessage>) -> Self {
        let value = serde_json::to_value(messages).unwrap_or(Value::Array(Vec::new()));
        self.with("messages", value)
    }
}

pub trait Renderer: Send + Sync {
    fn render(&self, page: Page) -> Result<HttpResponse, AppError>;
}

#[derive(Debug, Default, Clone)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, page: Page) -> Result<HttpResponse, AppError> {
        Ok(HttpResponse::Ok().json(serde_json::json!({
            "template": page.template,
            "context": Value::Object(page.context),
        })))
    }
}
