// handlers/protected/user.rs - per-account recipe listings

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, SessionContext};
use crate::state::AppState;

/// GET /user/liked-recipes - Recipes the caller liked; deleted ones are skipped
pub async fn liked_recipes(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Value> {
    let username = session.require_user("Must be logged in")?;
    let recipes = state.recipes().liked_recipes(username).await?;

    Ok(ApiResponse::success(json!({
        "count": recipes.len(),
        "likedRecipes": recipes
    })))
}

/// GET /users-recipes - The caller's own recipes, newest first
pub async fn users_recipes(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Value> {
    let username = session.require_user("Must be logged in")?;
    let recipes = state.recipes().list_by_creator(username).await?;

    Ok(ApiResponse::success(json!({
        "message": "Your recipes retrieved successfully",
        "count": recipes.len(),
        "recipes": recipes
    })))
}
