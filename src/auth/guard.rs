use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use futures::future::{ready, Ready};
use tracing::debug;

use crate::auth::session::{removal_cookie, token_from_request};
use crate::db::models::User;
use crate::error::{AppError, AuthError};
use crate::routes::{self, route_path};
use crate::AppState;

/// The account bound to the request's session, placed by [`require_login`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Raw session token, needed to end or keep this particular session.
    pub token: String,
}

/// Lets the request through only when its session cookie resolves to an
/// active account; anything else is redirected to the login page before the
/// handler runs.
pub async fn require_login<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::InternalError("application state is not configured".into()))?;

    let token = token_from_request(req.request(), &state.config.session);
    let had_token = token.is_some();
    let current = match token {
        Some(token) => state
            .auth_service
            .resolve_session(&token)
            .await?
            .map(|user| CurrentUser { user, token }),
        None => None,
    };

    match current {
        Some(current) => {
            req.extensions_mut().insert(current);
            Ok(next.call(req).await?.map_into_left_body())
        }
        None => {
            debug!(path = %req.path(), "Redirecting anonymous request to login");
            let location = route_path(req.request(), routes::LOGIN)?;
            let mut response = HttpResponse::Found();
            response.insert_header((header::LOCATION, location));
            // A cookie that no longer resolves is dropped from the browser too.
            if had_token {
                response.cookie(removal_cookie(&state.config.session));
            }
            Ok(req.into_response(response.finish()).map_into_right_body())
        }
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<CurrentUser>()
                .cloned()
                .ok_or(AppError::AuthError(AuthError::Unauthorized)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::db::store::{MockIdentityStore, MockSessionStore};
    use crate::routes::configure;
    use actix_web::cookie::Cookie;
    use actix_web::test::{self, TestRequest};
    use actix_web::App;
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_current_user_missing_without_guard() {
        let req = TestRequest::default().to_http_request();
        let result = CurrentUser::extract(&req).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::Unauthorized))));
    }

    #[actix_web::test]
    async fn test_current_user_read_from_extensions() {
        let req = TestRequest::default().to_http_request();
        let user = User::new("alice".into(), "hash".into());
        req.extensions_mut().insert(CurrentUser {
            user: user.clone(),
            token: "tok".into(),
        });

        let current = CurrentUser::extract(&req).await.unwrap();
        assert_eq!(current.user.id, user.id);
        assert_eq!(current.token, "tok");
    }

    #[actix_web::test]
    async fn test_anonymous_logout_destroys_nothing() {
        let config = Settings::new_for_test().unwrap();
        let routes = config.routes.clone();

        let mut sessions = MockSessionStore::new();
        sessions.expect_get_session().times(1).returning(|_| Ok(None));
        sessions.expect_delete_session().never();
        sessions.expect_delete_other_sessions().never();
        let mut identities = MockIdentityStore::new();
        identities.expect_find_by_id().never();

        let state = AppState::new(config, Arc::new(identities), Arc::new(sessions));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(move |cfg| configure(cfg, &routes)),
        )
        .await;

        let resp = TestRequest::post().uri("/logout").send_request(&app).await;
        assert_eq!(resp.status(), 302);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");
        assert!(resp.response().cookies().next().is_none());

        let resp = TestRequest::post()
            .uri("/logout")
            .cookie(Cookie::new("sessionid", "stale-token"))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 302);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");
        let removal = resp
            .response()
            .cookies()
            .find(|c| c.name() == "sessionid")
            .expect("stale session cookie cleared");
        assert_eq!(removal.value(), "");
    }
}
