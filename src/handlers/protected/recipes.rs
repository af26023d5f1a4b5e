// handlers/protected/recipes.rs - POST /recipe, PUT /recipe/:id, DELETE /recipe/:id

use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::extract::{ApiJson, RecipeSubmission};
use crate::middleware::{ApiResponse, ApiResult, SessionContext};
use crate::services::validation::{parse_recipe_id, RecipeDraft};
use crate::state::AppState;

/// POST /recipe - Create a recipe, optionally with images
///
/// Accepts JSON, or `multipart/form-data` with `ingredients` and
/// `instructions` as JSON-encoded text fields and up to five `images` files.
/// Rate limited per account.
///
/// ```json
/// {
///   "success": true,
///   "data": { "message": "Recipe created successfully", "recipe": { ... }, "imagesUploaded": 2 }
/// }
/// ```
pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    submission: Result<RecipeSubmission, ApiError>,
) -> ApiResult<Value> {
    let username = session.require_user("Must be logged in to create a recipe")?;
    let RecipeSubmission { draft, images } = submission?;

    let created = state.recipes().create(username, &draft, images).await?;

    Ok(ApiResponse::created(json!({
        "message": "Recipe created successfully",
        "recipe": created.recipe,
        "imagesUploaded": created.images_uploaded
    })))
}

/// PUT /recipe/:id - Owner-only merge-patch of the content fields
pub async fn update_recipe(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    body: Result<ApiJson<RecipeDraft>, ApiError>,
) -> ApiResult<Value> {
    let username = session.require_user("Must be logged in to update recipe")?;
    let id = parse_recipe_id(&id)?;
    let ApiJson(draft) = body?;

    let recipe = state.recipes().update(username, id, &draft).await?;

    Ok(ApiResponse::success(json!({
        "message": "Recipe updated successfully",
        "recipe": recipe
    })))
}

/// DELETE /recipe/:id - Owner-only; removes images, like and rating references, then the recipe
pub async fn delete_recipe(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let username = session.require_user("Must be logged in to delete recipe")?;
    let id = parse_recipe_id(&id)?;

    let deleted = state.recipes().delete(username, id).await?;

    Ok(ApiResponse::success(json!({
        "message": "Recipe deleted successfully",
        "imagesDeleted": deleted.images_deleted,
        "accountsUpdated": deleted.accounts_updated
    })))
}
