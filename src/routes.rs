//! Route table. Every page is registered under a logical name so redirects
//! follow configuration instead of hard-coded paths.

use actix_web::middleware::from_fn;
use actix_web::{web, HttpRequest};

use crate::auth::guard::require_login;
use crate::auth::handlers;
use crate::config::RoutesConfig;
use crate::error::AppError;

pub const REGISTER: &str = "register";
pub const LOGIN: &str = "login";
pub const LOGOUT: &str = "logout";
pub const PROFILE: &str = "profile";
pub const DASHBOARD: &str = "dashboard";
pub const PASSWORD_CHANGE: &str = "password_change";

pub fn configure(cfg: &mut web::ServiceConfig, routes: &RoutesConfig) {
    cfg.route("/health", web::get().to(crate::health_check))
        .service(
            web::resource(routes.register.as_str())
                .name(REGISTER)
                .route(web::get().to(handlers::register_form))
                .route(web::post().to(handlers::register)),
        )
        .service(
            web::resource(routes.login.as_str())
                .name(LOGIN)
                .route(web::get().to(handlers::login_form))
                .route(web::post().to(handlers::login)),
        )
        .service(
            web::resource(routes.logout.as_str())
                .name(LOGOUT)
                .route(web::get().to(handlers::logout))
                .route(web::post().to(handlers::logout))
                .wrap(from_fn(require_login)),
        )
        .service(
            web::resource(routes.profile.as_str())
                .name(PROFILE)
                .route(web::get().to(handlers::profile))
                .wrap(from_fn(require_login)),
        )
        .service(
            web::resource(routes.dashboard.as_str())
                .name(DASHBOARD)
                .route(web::get().to(handlers::dashboard))
                .wrap(from_fn(require_login)),
        )
        .service(
            web::resource(routes.password_change.as_str())
                .name(PASSWORD_CHANGE)
                .route(web::get().to(handlers::password_change_form))
                .route(web::post().to(handlers::password_change))
                .wrap(from_fn(require_login)),
        );
}

/// Path of the named route, e.g. `"/dashboard"` for [`DASHBOARD`].
pub fn route_path(req: &HttpRequest, name: &str) -> Result<String, AppError> {
    req.url_for_static(name)
        .map(|url| url.path().to_string())
        .map_err(|e| AppError::InternalError(format!("cannot resolve route {}: {:?}", name, e)))
}
