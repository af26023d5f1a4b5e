// handlers/public/auth.rs - POST /register, POST /login

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::handlers::extract::ApiJson;
use crate::middleware::session::session_cookie;
use crate::middleware::{ApiResponse, ApiResult, SessionContext};
use crate::services::{LoginRequest, RegisterRequest};
use crate::state::AppState;

/// POST /register - Create an account
///
/// Refused while a session is active.
///
/// ```json
/// { "name": "Bob", "username": "bob", "email": "bob@example.com", "password": "..." }
/// ```
pub async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<Value> {
    let profile = state
        .accounts()
        .register(&request, session.is_logged_in())
        .await?;

    Ok(ApiResponse::created(json!({
        "message": "Registration successful",
        "user": profile
    })))
}

/// POST /login - Verify credentials and set the session cookie
///
/// Any session already carried by the request is closed first.
///
/// ```json
/// { "success": true, "data": { "username": "bob" } }
/// ```
pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Value> {
    let accounts = state.accounts();
    let issued = accounts.login(&request).await?;

    if let Some(previous) = &session.token {
        accounts.logout(previous).await?;
    }

    let cookie = session_cookie(&state.config.security, &issued.token)?;
    Ok(ApiResponse::success(json!({ "username": issued.username })).with_cookie(cookie))
}
