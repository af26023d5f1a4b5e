use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A like relation between an account and a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedRecipe {
    pub recipe_id: Uuid,
    pub liked_at: DateTime<Utc>,
}

/// An account's rating of a recipe. At most one per recipe per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedRecipe {
    pub recipe_id: Uuid,
    pub rating: u8,
    pub rated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub liked_recipes: Vec<LikedRecipe>,
    pub rated_recipes: Vec<RatedRecipe>,
    pub created_at: DateTime<Utc>,
}

/// Account fields supplied at registration time; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Public view of an account, never carries the password hash
#[derive(Debug, Clone, Serialize)]
pub struct AccountProfile {
    pub username: String,
    pub name: String,
    pub email: String,
}

impl Account {
    pub fn from_new(new: NewAccount, created_at: DateTime<Utc>) -> Self {
        Self {
            username: new.username,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            liked_recipes: Vec::new(),
            rated_recipes: Vec::new(),
            created_at,
        }
    }

    pub fn has_liked(&self, recipe_id: Uuid) -> bool {
        self.liked_recipes.iter().any(|like| like.recipe_id == recipe_id)
    }

    /// Flips the like relation and reports whether the recipe is liked afterwards.
    pub fn toggle_like(&mut self, recipe_id: Uuid, now: DateTime<Utc>) -> bool {
        if self.has_liked(recipe_id) {
            self.liked_recipes.retain(|like| like.recipe_id != recipe_id);
            false
        } else {
            self.liked_recipes.push(LikedRecipe {
                recipe_id,
                liked_at: now,
            });
            true
        }
    }

    pub fn rating_for(&self, recipe_id: Uuid) -> Option<&RatedRecipe> {
        self.rated_recipes.iter().find(|entry| entry.recipe_id == recipe_id)
    }

    /// Records a rating, overwriting any earlier rating of the same recipe in place.
    pub fn upsert_rating(&mut self, recipe_id: Uuid, rating: u8, now: DateTime<Utc>) {
        match self
            .rated_recipes
            .iter_mut()
            .find(|entry| entry.recipe_id == recipe_id)
        {
            Some(entry) => {
                entry.rating = rating;
                entry.rated_at = now;
            }
            None => self.rated_recipes.push(RatedRecipe {
                recipe_id,
                rating,
                rated_at: now,
            }),
        }
    }

    /// Drops every like and rating that points at `recipe_id`. Returns true if anything changed.
    pub fn forget_recipe(&mut self, recipe_id: Uuid) -> bool {
        let before = self.liked_recipes.len() + self.rated_recipes.len();
        self.liked_recipes.retain(|like| like.recipe_id != recipe_id);
        self.rated_recipes.retain(|entry| entry.recipe_id != recipe_id);
        before != self.liked_recipes.len() + self.rated_recipes.len()
    }

    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            username: self.username.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}
