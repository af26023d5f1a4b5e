use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Account, NewAccount, Recipe};

/// Credential store: one record per registered account
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with `DatabaseError::Conflict` when the username or email is taken.
    async fn insert_account(&self, account: NewAccount) -> Result<Account, DatabaseError>;

    async fn find_account(&self, username: &str) -> Result<Option<Account>, DatabaseError>;

    /// Persists the account's name, email and its liked/rated lists.
    async fn save_account(&self, account: &Account) -> Result<(), DatabaseError>;

    /// Every rating any account holds for `recipe_id`.
    async fn ratings_for_recipe(&self, recipe_id: Uuid) -> Result<Vec<u8>, DatabaseError>;

    /// Strips likes and ratings of `recipe_id` from every account. Returns the number of accounts touched.
    async fn remove_recipe_references(&self, recipe_id: Uuid) -> Result<u64, DatabaseError>;
}

#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn insert_recipe(&self, recipe: &Recipe) -> Result<(), DatabaseError>;

    async fn find_recipe(&self, id: Uuid) -> Result<Option<Recipe>, DatabaseError>;

    /// Looks up several recipes, keeping the order of `ids` and skipping ids that no longer exist.
    async fn find_recipes(&self, ids: &[Uuid]) -> Result<Vec<Recipe>, DatabaseError>;

    async fn list_recipes(&self) -> Result<Vec<Recipe>, DatabaseError>;

    /// Newest first.
    async fn list_recipes_by_creator(&self, creator: &str) -> Result<Vec<Recipe>, DatabaseError>;

    /// Writes content fields and the image list. `NotFound` when the recipe is gone.
    async fn update_recipe(&self, recipe: &Recipe) -> Result<(), DatabaseError>;

    async fn set_likes(&self, id: Uuid, likes: u32) -> Result<(), DatabaseError>;

    async fn set_rating_stats(
        &self,
        id: Uuid,
        rating: Option<f64>,
        rating_count: u32,
    ) -> Result<(), DatabaseError>;

    /// Returns false when nothing was deleted.
    async fn delete_recipe(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

/// Server-side sessions keyed by the hash of the cookie token
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        token_hash: &str,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Resolves the username for an unexpired session.
    async fn find_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, DatabaseError>;

    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait DataStore: AccountStore + RecipeStore + SessionStore {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    fn backend_name(&self) -> &'static str;
}
