use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use cookie::time::Duration;
use cookie::{Cookie, SameSite};

use crate::auth::hash_token;
use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Session resolved for the current request.
///
/// Always present in request extensions after `session_middleware`; `username`
/// is `None` for anonymous callers or stale cookies.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    pub token: Option<String>,
    pub username: Option<String>,
}

impl SessionContext {
    /// The logged-in username, or a 401 carrying `message`.
    pub fn require_user(&self, message: &str) -> Result<&str, ApiError> {
        self.username
            .as_deref()
            .ok_or_else(|| ApiError::unauthorized(message))
    }

    pub fn is_logged_in(&self) -> bool {
        self.username.is_some()
    }
}

/// Resolves the session cookie into a `SessionContext` extension
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = session_token(request.headers(), &state.config.security.session_cookie_name);

    let username = match &token {
        Some(token) => state
            .store
            .find_session(&hash_token(token), Utc::now())
            .await
            .map_err(|e| ApiError::from(e).into_response())?,
        None => None,
    };

    request
        .extensions_mut()
        .insert(SessionContext { token, username });

    Ok(next.run(request).await)
}

/// Extract the session token from the Cookie header(s)
fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

fn base_cookie(security: &SecurityConfig, value: String) -> Cookie<'static> {
    Cookie::build((security.session_cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(security.require_https)
        .build()
}

fn to_header(cookie: &Cookie<'_>) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|_| ApiError::internal_server_error("Failed to build session cookie"))
}

/// Set-Cookie value that installs a session token
pub fn session_cookie(security: &SecurityConfig, token: &str) -> Result<HeaderValue, ApiError> {
    let mut cookie = base_cookie(security, token.to_string());
    cookie.set_max_age(Duration::hours(security.session_ttl_hours as i64));
    to_header(&cookie)
}

/// Set-Cookie value that expires the session cookie immediately
pub fn clear_cookie(security: &SecurityConfig) -> Result<HeaderValue, ApiError> {
    let mut cookie = base_cookie(security, String::new());
    cookie.make_removal();
    to_header(&cookie)
}
