// handlers/protected/auth.rs - GET /logout, GET /me

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::database::models::AccountProfile;
use crate::middleware::session::clear_cookie;
use crate::middleware::{ApiResponse, ApiResult, SessionContext};
use crate::state::AppState;

/// GET /logout - Drop the server-side session and expire the cookie
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Value> {
    let username = session.require_user("User is not logged in")?;
    if let Some(token) = &session.token {
        state.accounts().logout(token).await?;
    }

    tracing::info!("User logged out: {}", username);
    let cookie = clear_cookie(&state.config.security)?;
    Ok(ApiResponse::success(json!({ "message": "Successful logout" })).with_cookie(cookie))
}

/// GET /me - Profile of the logged-in account
///
/// ```json
/// { "success": true, "data": { "username": "bob", "name": "Bob", "email": "bob@example.com" } }
/// ```
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<AccountProfile> {
    let username = session.require_user("Not logged in")?;
    Ok(ApiResponse::success(state.accounts().me(username).await?))
}
