//! Page Routes
//!
//! Form-driven login, registration, logout, and the upload page.
//!
//! Endpoints:
//! - GET /            - Upload page with history (login required)
//! - GET/POST /login  - Login form
//! - GET/POST /register - Registration form
//! - GET /logout      - End the session

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;

use crate::auth::{
    flash_cookie, parse_flash, ClientAddr, FlashKind, SessionUser, FLASH_COOKIE, RETURN_TO_COOKIE,
    SESSION_COOKIE,
};
use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::html::{self, Flash};
use crate::state::AppState;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login_form).post(login))
        .route("/register", get(register_form).post(register))
        .route("/logout", get(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

/// Problems with a registration form, in display order
pub fn validate_registration(form: &RegisterForm) -> Vec<&'static str> {
    let mut errors = Vec::new();

    if form.username.trim().is_empty()
        || form.email.trim().is_empty()
        || form.password.is_empty()
        || form.password2.is_empty()
    {
        errors.push("Please fill in all fields");
    }
    if form.password != form.password2 {
        errors.push("Passwords do not match");
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push("Password must be at least 6 characters");
    }

    errors
}

/// Take the pending flash message out of the jar
fn take_flash(jar: CookieJar) -> (CookieJar, Flash) {
    let flash = jar.get(FLASH_COOKIE).and_then(|c| parse_flash(c.value()));
    let jar = if flash.is_some() {
        jar.remove(Cookie::build(FLASH_COOKIE).path("/"))
    } else {
        jar
    };
    (jar, flash)
}

fn redirect_with_flash(jar: CookieJar, kind: FlashKind, message: &str, to: &str) -> Response {
    (jar.add(flash_cookie(kind, message)), Redirect::to(to)).into_response()
}

/// Only same-site absolute paths are honored as return targets
fn safe_return_to(value: Option<&str>) -> String {
    match value {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/".to_string(),
    }
}

/// GET /
async fn index(
    State(state): State<AppState>,
    session: Option<SessionUser>,
    jar: CookieJar,
) -> Result<Response> {
    let Some(session) = session else {
        let jar = jar.add(Cookie::build((RETURN_TO_COOKIE, "/")).path("/").http_only(true));
        return Ok(redirect_with_flash(jar, FlashKind::Error, "Please log in first", "/login"));
    };

    let history = state
        .uploads()
        .history(state.db(), &session.user.id, state.config().upload.history_cap())
        .await?;

    let (jar, flash) = take_flash(jar);
    let page = html::index_page(
        &session.user.username,
        &history,
        state.config().upload.max_bytes,
        &flash,
    );

    Ok((jar, Html(page)).into_response())
}

/// GET /login
async fn login_form(session: Option<SessionUser>, jar: CookieJar) -> Response {
    if session.is_some() {
        return Redirect::to("/").into_response();
    }
    let (jar, flash) = take_flash(jar);
    (jar, Html(html::login_page(&flash))).into_response()
}

/// POST /login
async fn login(
    State(state): State<AppState>,
    ClientAddr(ip): ClientAddr,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    if form.username.trim().is_empty() || form.password.is_empty() {
        return Ok(redirect_with_flash(jar, FlashKind::Error, "Please fill in all fields", "/login"));
    }

    let user = match UserRepository::new(state.db())
        .login(form.username.trim(), &form.password, &ip)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            return Ok(redirect_with_flash(jar, FlashKind::Error, &e.public_message(), "/login"));
        }
    };

    let token = state.sessions().create(state.db(), &user.id).await?;
    let return_to = safe_return_to(jar.get(RETURN_TO_COOKIE).map(|c| c.value()));

    let jar = jar
        .remove(Cookie::build(RETURN_TO_COOKIE).path("/"))
        .add(state.sessions().cookie(token));

    Ok(redirect_with_flash(jar, FlashKind::Success, "Logged in", &return_to))
}

/// GET /register
async fn register_form(session: Option<SessionUser>, jar: CookieJar) -> Response {
    if session.is_some() {
        return Redirect::to("/").into_response();
    }
    let (jar, flash) = take_flash(jar);
    (jar, Html(html::register_page(&flash))).into_response()
}

/// POST /register
async fn register(
    State(state): State<AppState>,
    ClientAddr(ip): ClientAddr,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    let errors = validate_registration(&form);
    if !errors.is_empty() {
        return redirect_with_flash(jar, FlashKind::Error, &errors.join(", "), "/register");
    }

    let result = UserRepository::new(state.db())
        .register(form.username.trim(), form.email.trim(), &form.password, &ip)
        .await;

    match result {
        Ok(_) => redirect_with_flash(
            jar,
            FlashKind::Success,
            "Registration successful, please log in",
            "/login",
        ),
        Err(e @ (AppError::DuplicateUsername | AppError::DuplicateEmail)) => {
            redirect_with_flash(jar, FlashKind::Error, &e.to_string(), "/register")
        }
        Err(e) => redirect_with_flash(
            jar,
            FlashKind::Error,
            &format!("Registration failed: {}", e.public_message()),
            "/register",
        ),
    }
}

/// GET /logout
async fn logout(
    State(state): State<AppState>,
    session: Option<SessionUser>,
    jar: CookieJar,
) -> Response {
    if let Some(session) = session {
        if let Err(e) = state.sessions().revoke(state.db(), &session.token).await {
            tracing::error!("Logout error: {}", e);
        }
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/login")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, email: &str, password: &str, password2: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password2: password2.to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(validate_registration(&form("alice", "a@x.com", "secret1", "secret1")).is_empty());
    }

    #[test]
    fn test_registration_errors_accumulate() {
        let errors = validate_registration(&form("alice", "a@x.com", "abc", "abd"));
        assert_eq!(
            errors,
            vec!["Passwords do not match", "Password must be at least 6 characters"]
        );

        let errors = validate_registration(&form("", "a@x.com", "secret1", "secret1"));
        assert_eq!(errors, vec!["Please fill in all fields"]);
    }

    #[test]
    fn test_safe_return_to() {
        assert_eq!(safe_return_to(Some("/uploads")), "/uploads");
        assert_eq!(safe_return_to(Some("//evil.example.com")), "/");
        assert_eq!(safe_return_to(Some("https://evil.example.com")), "/");
        assert_eq!(safe_return_to(None), "/");
    }
}
