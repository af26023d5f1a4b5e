use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{types::Json, FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::manager::{DatabaseError, DatabaseManager};
use super::models::{Account, Ingredient, LikedRecipe, NewAccount, RatedRecipe, Recipe, RecipeImage};
use super::store::{AccountStore, DataStore, RecipeStore, SessionStore};

const RECIPE_COLUMNS: &str = "id, name, description, ingredients, instructions, creator, images, \
     likes, rating, rating_count, difficulty, time, created_at, updated_at";

#[derive(FromRow)]
struct AccountRow {
    username: String,
    name: String,
    email: String,
    password_hash: String,
    liked_recipes: Json<Vec<LikedRecipe>>,
    rated_recipes: Json<Vec<RatedRecipe>>,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            username: row.username,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            liked_recipes: row.liked_recipes.0,
            rated_recipes: row.rated_recipes.0,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct RecipeRow {
    id: Uuid,
    name: String,
    description: String,
    ingredients: Json<Vec<Ingredient>>,
    instructions: Json<Vec<String>>,
    creator: String,
    images: Json<Vec<RecipeImage>>,
    likes: i64,
    rating: Option<f64>,
    rating_count: i32,
    difficulty: Option<f64>,
    time: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Recipe {
            id: row.id,
            name: row.name,
            description: row.description,
            ingredients: row.ingredients.0,
            instructions: row.instructions.0,
            creator: row.creator,
            images: row.images.0,
            likes: u32::try_from(row.likes).unwrap_or(0),
            rating: row.rating,
            rating_count: u32::try_from(row.rating_count).unwrap_or(0),
            difficulty: row.difficulty,
            time: row.time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres-backed store. Accounts carry their liked/rated lists as JSONB.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps unique violations onto `Conflict`, naming the field that clashed.
fn map_insert_error(err: sqlx::Error) -> DatabaseError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some("accounts_email_key") => "email",
                _ => "username",
            };
            return DatabaseError::Conflict(field.to_string());
        }
    }
    DatabaseError::Sqlx(err)
}

#[async_trait]
impl AccountStore for PgStore {
    async fn insert_account(&self, account: NewAccount) -> Result<Account, DatabaseError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "INSERT INTO accounts (username, name, email, password_hash) \
             VALUES ($1, $2, $3, $4) \
             RETURNING username, name, email, password_hash, liked_recipes, rated_recipes, created_at",
        )
        .bind(&account.username)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(row.into())
    }

    async fn find_account(&self, username: &str) -> Result<Option<Account>, DatabaseError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT username, name, email, password_hash, liked_recipes, rated_recipes, created_at \
             FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Account::from))
    }

    async fn save_account(&self, account: &Account) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE accounts SET name = $2, email = $3, liked_recipes = $4, rated_recipes = $5 \
             WHERE username = $1",
        )
        .bind(&account.username)
        .bind(&account.name)
        .bind(&account.email)
        .bind(Json(&account.liked_recipes))
        .bind(Json(&account.rated_recipes))
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("account {}", account.username)));
        }
        Ok(())
    }

    async fn ratings_for_recipe(&self, recipe_id: Uuid) -> Result<Vec<u8>, DatabaseError> {
        let ratings: Vec<i32> = sqlx::query_scalar(
            "SELECT (entry->>'rating')::int4 \
             FROM accounts, jsonb_array_elements(rated_recipes) AS entry \
             WHERE entry->>'recipeId' = $1",
        )
        .bind(recipe_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(ratings
            .into_iter()
            .filter_map(|rating| u8::try_from(rating).ok())
            .collect())
    }

    async fn remove_recipe_references(&self, recipe_id: Uuid) -> Result<u64, DatabaseError> {
        let reference = Json(json!([{ "recipeId": recipe_id }]));
        let result = sqlx::query(
            "UPDATE accounts SET \
               liked_recipes = COALESCE((SELECT jsonb_agg(e) FROM jsonb_array_elements(liked_recipes) e \
                                         WHERE e->>'recipeId' <> $1), '[]'::jsonb), \
               rated_recipes = COALESCE((SELECT jsonb_agg(e) FROM jsonb_array_elements(rated_recipes) e \
                                         WHERE e->>'recipeId' <> $1), '[]'::jsonb) \
             WHERE liked_recipes @> $2 OR rated_recipes @> $2",
        )
        .bind(recipe_id.to_string())
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecipeStore for PgStore {
    async fn insert_recipe(&self, recipe: &Recipe) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO recipes (id, name, description, ingredients, instructions, creator, images, \
             likes, rating, rating_count, difficulty, time, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(recipe.id)
        .bind(&recipe.name)
        .bind(&recipe.description)
        .bind(Json(&recipe.ingredients))
        .bind(Json(&recipe.instructions))
        .bind(&recipe.creator)
        .bind(Json(&recipe.images))
        .bind(i64::from(recipe.likes))
        .bind(recipe.rating)
        .bind(recipe.rating_count as i32)
        .bind(recipe.difficulty)
        .bind(&recipe.time)
        .bind(recipe.created_at)
        .bind(recipe.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn find_recipe(&self, id: Uuid) -> Result<Option<Recipe>, DatabaseError> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {} FROM recipes WHERE id = $1",
            RECIPE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Recipe::from))
    }

    async fn find_recipes(&self, ids: &[Uuid]) -> Result<Vec<Recipe>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {} FROM recipes WHERE id = ANY($1)",
            RECIPE_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut found: Vec<Recipe> = rows.into_iter().map(Recipe::from).collect();
        let mut ordered = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(pos) = found.iter().position(|recipe| recipe.id == *id) {
                ordered.push(found.swap_remove(pos));
            }
        }
        Ok(ordered)
    }

    async fn list_recipes(&self) -> Result<Vec<Recipe>, DatabaseError> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {} FROM recipes ORDER BY created_at ASC",
            RECIPE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Recipe::from).collect())
    }

    async fn list_recipes_by_creator(&self, creator: &str) -> Result<Vec<Recipe>, DatabaseError> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {} FROM recipes WHERE creator = $1 ORDER BY created_at DESC",
            RECIPE_COLUMNS
        ))
        .bind(creator)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Recipe::from).collect())
    }

    async fn update_recipe(&self, recipe: &Recipe) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE recipes SET name = $2, description = $3, ingredients = $4, instructions = $5, \
             images = $6, difficulty = $7, time = $8, updated_at = $9 WHERE id = $1",
        )
        .bind(recipe.id)
        .bind(&recipe.name)
        .bind(&recipe.description)
        .bind(Json(&recipe.ingredients))
        .bind(Json(&recipe.instructions))
        .bind(Json(&recipe.images))
        .bind(recipe.difficulty)
        .bind(&recipe.time)
        .bind(recipe.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("recipe {}", recipe.id)));
        }
        Ok(())
    }

    async fn set_likes(&self, id: Uuid, likes: u32) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE recipes SET likes = $2 WHERE id = $1")
            .bind(id)
            .bind(i64::from(likes))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_rating_stats(
        &self,
        id: Uuid,
        rating: Option<f64>,
        rating_count: u32,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE recipes SET rating = $2, rating_count = $3 WHERE id = $1")
            .bind(id)
            .bind(rating)
            .bind(rating_count as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(
        &self,
        token_hash: &str,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?
            .rows_affected();
        if purged > 0 {
            debug!("Purged {} expired sessions", purged);
        }

        sqlx::query("INSERT INTO sessions (token_hash, username, expires_at) VALUES ($1, $2, $3)")
            .bind(token_hash)
            .bind(username)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, DatabaseError> {
        let username = sqlx::query_scalar(
            "SELECT username FROM sessions WHERE token_hash = $1 AND expires_at > $2",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(username)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
