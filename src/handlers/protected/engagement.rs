// handlers/protected/engagement.rs - likes and ratings

use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::extract::ApiJson;
use crate::middleware::{ApiResponse, ApiResult, SessionContext};
use crate::services::validation::parse_recipe_id;
use crate::services::OwnRating;
use crate::state::AppState;

/// POST /recipe/:id/like - Toggle the caller's like
///
/// ```json
/// { "success": true, "data": { "message": "Recipe liked", "likes": 3, "liked": true } }
/// ```
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let username = session.require_user("Must be logged in")?;
    let id = parse_recipe_id(&id)?;

    let toggle = state.likes().toggle_like(username, id).await?;
    let message = if toggle.liked { "Recipe liked" } else { "Recipe unliked" };

    Ok(ApiResponse::success(json!({
        "message": message,
        "likes": toggle.likes,
        "liked": toggle.liked
    })))
}

/// POST /recipe/:id/rate - Rate 1-5; re-rating replaces the earlier value
///
/// ```json
/// { "rating": 4 }
/// ```
pub async fn rate_recipe(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    body: Result<ApiJson<Value>, ApiError>,
) -> ApiResult<Value> {
    let username = session.require_user("Must be logged in")?;
    let id = parse_recipe_id(&id)?;
    let ApiJson(body) = body?;

    let summary = state
        .ratings()
        .submit_rating(username, id, body.get("rating"))
        .await?;

    Ok(ApiResponse::success(json!({
        "message": "Rating submitted",
        "yourRating": summary.your_rating,
        "rating": summary.rating,
        "ratingCount": summary.rating_count
    })))
}

/// GET /recipe/:id/rating - The caller's own rating, nulls when not rated yet
pub async fn get_rating(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<OwnRating> {
    let username = session.require_user("Must be logged in")?;
    let id = parse_recipe_id(&id)?;
    Ok(ApiResponse::success(state.ratings().get_rating(username, id).await?))
}
