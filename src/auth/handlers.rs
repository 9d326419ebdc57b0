use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::forms::{form_context, LoginForm, PasswordChangeForm, RegistrationForm};
use crate::auth::guard::CurrentUser;
use crate::auth::messages::Messages;
use crate::auth::session::{removal_cookie, session_cookie, token_from_request};
use crate::error::AppError;
use crate::render::{
    Page, DASHBOARD_TEMPLATE, LOGIN_TEMPLATE, PASSWORD_CHANGE_TEMPLATE, PROFILE_TEMPLATE,
    REGISTER_TEMPLATE,
};
use crate::routes::{self, route_path};
use crate::AppState;

pub const REGISTRATION_SUCCESS: &str = "Registration successful. Welcome!";
pub const ACCOUNT_DOES_NOT_EXIST: &str = "Account does not exist";
pub const INVALID_LOGIN: &str = "Invalid username or password.";
pub const LOGGED_OUT: &str = "You have been logged out.";
pub const PASSWORD_CHANGED: &str = "Your password was successfully updated!";
pub const DASHBOARD_WELCOME: &str = "Welcome to your dashboard!";

pub async fn register_form(
    state: web::Data<AppState>,
    messages: Messages,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(REGISTER_TEMPLATE)
        .with("form", form_context(RegistrationForm::default().data(), None));
    render(&state, page, messages)
}

pub async fn register(
    req: HttpRequest,
    form: Result<web::Form<RegistrationForm>, actix_web::Error>,
    state: web::Data<AppState>,
    mut messages: Messages,
) -> Result<HttpResponse, AppError> {
    let form = submitted(form);
    info!("Received registration request for username: {}", form.username());

    match state.auth_service.register(&form).await? {
        Ok(user) => {
            let previous = token_from_request(&req, &state.config.session);
            let token = state.auth_service.start_session(&user, previous.as_deref()).await?;
            messages.success(REGISTRATION_SUCCESS);
            let cookie = session_cookie(&token, &state.config.session);
            redirect(&req, &state, routes::DASHBOARD, messages, Some(cookie))
        }
        Err(errors) => {
            warn!("Registration rejected for username: {}", form.username());
            for message in errors.messages() {
                messages.error(message);
            }
            let page = Page::new(REGISTER_TEMPLATE)
                .with("form", form_context(form.data(), Some(&errors)));
            render(&state, page, messages)
        }
    }
}

pub async fn login_form(
    state: web::Data<AppState>,
    messages: Messages,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(LOGIN_TEMPLATE)
        .with("form", form_context(LoginForm::default().data(), None));
    render(&state, page, messages)
}

pub async fn login(
    req: HttpRequest,
    form: Result<web::Form<LoginForm>, actix_web::Error>,
    state: web::Data<AppState>,
    mut messages: Messages,
) -> Result<HttpResponse, AppError> {
    let form = submitted(form);

    let errors = form.validate();
    if !errors.is_empty() {
        warn!("Malformed login submission");
        messages.error(INVALID_LOGIN);
        let page =
            Page::new(LOGIN_TEMPLATE).with("form", form_context(form.data(), Some(&errors)));
        return render(&state, page, messages);
    }

    info!("Received login request for username: {}", form.username());
    match state.auth_service.authenticate(form.username(), &form.password).await? {
        Some(user) => {
            let previous = token_from_request(&req, &state.config.session);
            let token = state.auth_service.start_session(&user, previous.as_deref()).await?;
            messages.success(format!("Welcome back, {}!", user.username));
            let cookie = session_cookie(&token, &state.config.session);
            redirect(&req, &state, routes::DASHBOARD, messages, Some(cookie))
        }
        None => {
            warn!("Login failed for username: {}", form.username());
            if state.config.auth.uniform_login_failure {
                messages.error(INVALID_LOGIN);
            } else {
                messages.error(ACCOUNT_DOES_NOT_EXIST);
            }
            let page = Page::new(LOGIN_TEMPLATE).with("form", form_context(form.data(), None));
            render(&state, page, messages)
        }
    }
}

pub async fn logout(
    req: HttpRequest,
    current: CurrentUser,
    state: web::Data<AppState>,
    mut messages: Messages,
) -> Result<HttpResponse, AppError> {
    state.auth_service.end_session(&current.token).await?;
    info!(user_id = %current.user.id, "Logged out");

    messages.info(LOGGED_OUT);
    let cookie = removal_cookie(&state.config.session);
    redirect(&req, &state, routes::LOGIN, messages, Some(cookie))
}

pub async fn profile(
    current: CurrentUser,
    state: web::Data<AppState>,
    messages: Messages,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(PROFILE_TEMPLATE).with("user", json!(current.user));
    render(&state, page, messages)
}

pub async fn dashboard(
    current: CurrentUser,
    state: web::Data<AppState>,
    messages: Messages,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(DASHBOARD_TEMPLATE)
        .with("message", json!(DASHBOARD_WELCOME))
        .with("user", json!(current.user));
    render(&state, page, messages)
}

pub async fn password_change_form(
    _current: CurrentUser,
    state: web::Data<AppState>,
    messages: Messages,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(PASSWORD_CHANGE_TEMPLATE).with("form", form_context(json!({}), None));
    render(&state, page, messages)
}

pub async fn password_change(
    req: HttpRequest,
    current: CurrentUser,
    form: Result<web::Form<PasswordChangeForm>, actix_web::Error>,
    state: web::Data<AppState>,
    mut messages: Messages,
) -> Result<HttpResponse, AppError> {
    let form = submitted(form);

    match state
        .auth_service
        .change_password(&current.user, &current.token, &form)
        .await?
    {
        Ok(()) => {
            messages.success(PASSWORD_CHANGED);
            redirect(&req, &state, routes::PROFILE, messages, None)
        }
        Err(errors) => {
            warn!(user_id = %current.user.id, "Password change rejected");
            for message in errors.messages() {
                messages.error(message);
            }
            let page = Page::new(PASSWORD_CHANGE_TEMPLATE)
                .with("form", form_context(json!({}), Some(&errors)));
            render(&state, page, messages)
        }
    }
}

/// The submitted form, or an empty one when the body is not a readable
/// urlencoded form. Field validation then reports what is missing.
fn submitted<T: Default>(form: Result<web::Form<T>, actix_web::Error>) -> T {
    match form {
        Ok(form) => form.into_inner(),
        Err(e) => {
            debug!("Unreadable form submission: {}", e);
            T::default()
        }
    }
}

fn render(state: &AppState, page: Page, mut messages: Messages) -> Result<HttpResponse, AppError> {
    let page = page.with_messages(messages.take_for_render());
    let mut response = state.renderer.render(page)?;
    messages.clear_cookie(&mut response)?;
    Ok(response)
}

fn redirect(
    req: &HttpRequest,
    state: &AppState,
    route: &str,
    messages: Messages,
    cookie: Option<Cookie<'static>>,
) -> Result<HttpResponse, AppError> {
    let location = route_path(req, route)?;
    let mut builder = HttpResponse::Found();
    builder.insert_header((header::LOCATION, location));
    if let Some(cookie) = cookie {
        builder.cookie(cookie);
    }
    messages.persist(&mut builder, &state.cookie_key)?;
    Ok(builder.finish())
}
