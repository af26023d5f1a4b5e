use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::load_account;
use crate::database::DataStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeToggle {
    pub likes: u32,
    pub liked: bool,
}

pub struct LikeService {
    store: Arc<dyn DataStore>,
}

impl LikeService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Flips the caller's like of a recipe. The counter never drops below zero.
    pub async fn toggle_like(&self, username: &str, recipe_id: Uuid) -> ServiceResult<LikeToggle> {
        let recipe = self
            .store
            .find_recipe(recipe_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Recipe not found"))?;

        let mut account = load_account(self.store.as_ref(), username).await?;
        let liked = account.toggle_like(recipe_id, Utc::now());
        self.store.save_account(&account).await?;

        let likes = if liked {
            recipe.likes.saturating_add(1)
        } else {
            recipe.likes.saturating_sub(1)
        };
        self.store.set_likes(recipe_id, likes).await?;

        debug!("{} toggled like on {}: liked={} likes={}", username, recipe_id, liked, likes);
        Ok(LikeToggle { likes, liked })
    }
}
