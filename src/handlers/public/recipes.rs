// handlers/public/recipes.rs - anonymous read access to recipes

use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::database::models::Recipe;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::validation::parse_recipe_id;
use crate::state::AppState;

/// GET /recipes - Every recipe, regardless of session
pub async fn list_recipes(State(state): State<AppState>) -> ApiResult<Value> {
    let recipes = state.recipes().list().await?;

    Ok(ApiResponse::success(json!({
        "message": "Recipes retrieved successfully",
        "count": recipes.len(),
        "recipes": recipes
    })))
}

/// GET /recipe/:id - A single recipe. Malformed ids are a 400, unknown ids a 404.
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Recipe> {
    let id = parse_recipe_id(&id)?;
    let recipe = state.recipes().get(id).await?;
    Ok(ApiResponse::success(recipe))
}
