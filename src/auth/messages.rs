//! One-shot status messages.
//!
//! Messages raised while rendering go straight into that page. Messages raised
//! before a redirect travel in a signed cookie and are shown, then cleared, by
//! the next page that renders.

use actix_web::cookie::{Cookie, CookieJar, Key, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, HttpResponseBuilder};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::future::{ready, Ready};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;
use crate::AppState;

pub const FLASH_COOKIE: &str = "messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub level: Level,
    pub text: String,
}

/// Pending messages for the current request: those carried over from the
/// previous response plus any added while handling this one.
#[derive(Debug, Default)]
pub struct Messages {
    queue: Vec<StatusMessage>,
    carried_cookie: bool,
}

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and verifies the flash cookie. A bad signature or body yields no messages.
    pub fn from_cookie(req: &HttpRequest, key: &Key) -> Self {
        let Some(cookie) = req.cookie(FLASH_COOKIE) else {
            return Self::new();
        };

        let mut jar = CookieJar::new();
        jar.add_original(cookie);
        let queue = jar
            .signed(key)
            .get(FLASH_COOKIE)
            .and_then(|c| decode(c.value()));

        if queue.is_none() {
            warn!("Discarding unverifiable flash cookie");
        }

        Self {
            queue: queue.unwrap_or_default(),
            carried_cookie: true,
        }
    }

    pub fn add(&mut self, level: Level, text: impl Into<String>) {
        self.queue.push(StatusMessage {
            level,
            text: text.into(),
        });
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.add(Level::Success, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.add(Level::Error, text);
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.add(Level::Info, text);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Hands the messages to a page that is about to render. Pair with
    /// [`Messages::clear_cookie`] on the built response.
    pub fn take_for_render(&mut self) -> Vec<StatusMessage> {
        std::mem::take(&mut self.queue)
    }

    /// Removes the flash cookie from `response` if the request carried one.
    pub fn clear_cookie(&self, response: &mut HttpResponse) -> Result<(), AppError> {
        if self.carried_cookie {
            let mut cookie = flash_cookie_base(String::new());
            cookie.make_removal();
            response
                .add_cookie(&cookie)
                .map_err(|e| AppError::InternalError(e.to_string()))?;
        }
        Ok(())
    }

    /// Stores the queue on a response that does not render, typically a redirect.
    pub fn persist(self, builder: &mut HttpResponseBuilder, key: &Key) -> Result<(), AppError> {
        if self.queue.is_empty() {
            if self.carried_cookie {
                let mut cookie = flash_cookie_base(String::new());
                cookie.make_removal();
                builder.cookie(cookie);
            }
            return Ok(());
        }

        let payload = serde_json::to_vec(&self.queue)
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        let mut jar = CookieJar::new();
        jar.signed_mut(key)
            .add(flash_cookie_base(URL_SAFE_NO_PAD.encode(payload)));

        if let Some(signed) = jar.get(FLASH_COOKIE) {
            builder.cookie(signed.clone());
        }
        Ok(())
    }
}

impl FromRequest for Messages {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = req
            .app_data::<web::Data<AppState>>()
            .map(|state| Messages::from_cookie(req, &state.cookie_key))
            .ok_or_else(|| AppError::InternalError("application state is not configured".into()));
        ready(result)
    }
}

fn flash_cookie_base(value: String) -> Cookie<'static> {
    Cookie::build(FLASH_COOKIE, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

fn decode(value: &str) -> Option<Vec<StatusMessage>> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn key() -> Key {
        Key::from(&[7u8; 64][..])
    }

    fn persisted_cookie(messages: Messages, key: &Key) -> Option<Cookie<'static>> {
        let mut builder = HttpResponse::Found();
        messages.persist(&mut builder, key).unwrap();
        let response = builder.finish();
        let cookie = response.cookies().find(|c| c.name() == FLASH_COOKIE);
        cookie.map(|c| c.into_owned())
    }

    #[test]
    fn test_level_serializes_lowercase() {
        let msg = StatusMessage {
            level: Level::Success,
            text: "ok".into(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            serde_json::json!({"level": "success", "text": "ok"})
        );
    }

    #[test]
    fn test_messages_survive_redirect() {
        let key = key();
        let mut messages = Messages::new();
        messages.info("You have been logged out.");
        messages.error("Something else");

        let cookie = persisted_cookie(messages, &key).expect("flash cookie set");
        assert_eq!(cookie.http_only(), Some(true));

        let req = TestRequest::default().cookie(cookie).to_http_request();
        let mut restored = Messages::from_cookie(&req, &key);
        let shown = restored.take_for_render();

        assert_eq!(
            shown,
            vec![
                StatusMessage {
                    level: Level::Info,
                    text: "You have been logged out.".into(),
                },
                StatusMessage {
                    level: Level::Error,
                    text: "Something else".into(),
                },
            ]
        );
        assert!(restored.is_empty());
    }

    #[test]
    fn test_tampered_cookie_is_ignored() {
        let key = key();
        let payload = URL_SAFE_NO_PAD.encode(br#"[{"level":"info","text":"hi"}]"#);
        let forged = Cookie::new(FLASH_COOKIE, payload);
        let req = TestRequest::default().cookie(forged).to_http_request();

        let messages = Messages::from_cookie(&req, &key);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_cookie_signed_with_other_key_is_ignored() {
        let mut messages = Messages::new();
        messages.success("hello");
        let cookie = persisted_cookie(messages, &Key::from(&[9u8; 64][..])).unwrap();

        let req = TestRequest::default().cookie(cookie).to_http_request();
        assert!(Messages::from_cookie(&req, &key()).is_empty());
    }

    #[test]
    fn test_empty_queue_sets_no_cookie() {
        assert!(persisted_cookie(Messages::new(), &key()).is_none());
    }

    #[test]
    fn test_render_clears_carried_cookie() {
        let key = key();
        let mut messages = Messages::new();
        messages.success("hello");
        let cookie = persisted_cookie(messages, &key).unwrap();

        let req = TestRequest::default().cookie(cookie).to_http_request();
        let mut restored = Messages::from_cookie(&req, &key);
        restored.take_for_render();

        let mut response = HttpResponse::Ok().finish();
        restored.clear_cookie(&mut response).unwrap();
        let removal = response.cookies().find(|c| c.name() == FLASH_COOKIE).unwrap();
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(actix_web::cookie::time::Duration::ZERO));
    }
}
