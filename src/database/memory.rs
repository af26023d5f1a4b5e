use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Account, NewAccount, Recipe};
use super::store::{AccountStore, DataStore, RecipeStore, SessionStore};

struct Session {
    username: String,
    expires_at: DateTime<Utc>,
}

/// Process-local store used when no database is configured, and by the tests.
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, Account>>,
    recipes: RwLock<HashMap<Uuid, Recipe>>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, account: NewAccount) -> Result<Account, DatabaseError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.username) {
            return Err(DatabaseError::Conflict("username".to_string()));
        }
        if accounts.values().any(|existing| existing.email == account.email) {
            return Err(DatabaseError::Conflict("email".to_string()));
        }

        let account = Account::from_new(account, Utc::now());
        accounts.insert(account.username.clone(), account.clone());
        Ok(account)
    }

    async fn find_account(&self, username: &str) -> Result<Option<Account>, DatabaseError> {
        Ok(self.accounts.read().await.get(username).cloned())
    }

    async fn save_account(&self, account: &Account) -> Result<(), DatabaseError> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&account.username) {
            Some(stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("account {}", account.username))),
        }
    }

    async fn ratings_for_recipe(&self, recipe_id: Uuid) -> Result<Vec<u8>, DatabaseError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .filter_map(|account| account.rating_for(recipe_id).map(|entry| entry.rating))
            .collect())
    }

    async fn remove_recipe_references(&self, recipe_id: Uuid) -> Result<u64, DatabaseError> {
        let mut accounts = self.accounts.write().await;
        let touched = accounts
            .values_mut()
            .map(|account| account.forget_recipe(recipe_id))
            .filter(|changed| *changed)
            .count();
        Ok(touched as u64)
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn insert_recipe(&self, recipe: &Recipe) -> Result<(), DatabaseError> {
        let mut recipes = self.recipes.write().await;
        if recipes.contains_key(&recipe.id) {
            return Err(DatabaseError::Conflict("id".to_string()));
        }
        recipes.insert(recipe.id, recipe.clone());
        Ok(())
    }

    async fn find_recipe(&self, id: Uuid) -> Result<Option<Recipe>, DatabaseError> {
        Ok(self.recipes.read().await.get(&id).cloned())
    }

    async fn find_recipes(&self, ids: &[Uuid]) -> Result<Vec<Recipe>, DatabaseError> {
        let recipes = self.recipes.read().await;
        Ok(ids.iter().filter_map(|id| recipes.get(id).cloned()).collect())
    }

    async fn list_recipes(&self) -> Result<Vec<Recipe>, DatabaseError> {
        let mut all: Vec<Recipe> = self.recipes.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn list_recipes_by_creator(&self, creator: &str) -> Result<Vec<Recipe>, DatabaseError> {
        let mut owned: Vec<Recipe> = self
            .recipes
            .read()
            .await
            .values()
            .filter(|recipe| recipe.creator == creator)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn update_recipe(&self, recipe: &Recipe) -> Result<(), DatabaseError> {
        let mut recipes = self.recipes.write().await;
        let stored = recipes
            .get_mut(&recipe.id)
            .ok_or_else(|| DatabaseError::NotFound(format!("recipe {}", recipe.id)))?;

        // Counters belong to set_likes / set_rating_stats
        stored.name = recipe.name.clone();
        stored.description = recipe.description.clone();
        stored.ingredients = recipe.ingredients.clone();
        stored.instructions = recipe.instructions.clone();
        stored.images = recipe.images.clone();
        stored.difficulty = recipe.difficulty;
        stored.time = recipe.time.clone();
        stored.updated_at = recipe.updated_at;
        Ok(())
    }

    async fn set_likes(&self, id: Uuid, likes: u32) -> Result<(), DatabaseError> {
        if let Some(recipe) = self.recipes.write().await.get_mut(&id) {
            recipe.likes = likes;
        }
        Ok(())
    }

    async fn set_rating_stats(
        &self,
        id: Uuid,
        rating: Option<f64>,
        rating_count: u32,
    ) -> Result<(), DatabaseError> {
        if let Some(recipe) = self.recipes.write().await.get_mut(&id) {
            recipe.rating = rating;
            recipe.rating_count = rating_count;
        }
        Ok(())
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.recipes.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        token_hash: &str,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            token_hash.to_string(),
            Session {
                username: username.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn find_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, DatabaseError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(token_hash) {
            Some(session) if session.expires_at > now => Ok(Some(session.username.clone())),
            Some(_) => {
                sessions.remove(token_hash);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError> {
        self.sessions.write().await.remove(token_hash);
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            name: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_username_and_email() {
        let store = MemoryStore::new();
        store.insert_account(new_account("bob", "bob@example.com")).await.unwrap();

        let err = store
            .insert_account(new_account("bob", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(field) if field == "username"));

        let err = store
            .insert_account(new_account("robert", "bob@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(field) if field == "email"));
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_session("live", "bob", now + Duration::hours(1)).await.unwrap();
        store.create_session("stale", "bob", now - Duration::seconds(1)).await.unwrap();

        assert_eq!(store.find_session("live", now).await.unwrap().as_deref(), Some("bob"));
        assert_eq!(store.find_session("stale", now).await.unwrap(), None);

        store.delete_session("live").await.unwrap();
        assert_eq!(store.find_session("live", now).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_sessions_are_evicted() {
        let store = MemoryStore::new();
        let past = Utc::now() - Duration::hours(1);
        for i in 0..100 {
            store.create_session(&format!("stale-{}", i), "bob", past).await.unwrap();
        }
        // Each login sweeps what expired before it
        assert_eq!(store.sessions.read().await.len(), 1);

        store
            .create_session("live", "bob", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        let sessions = store.sessions.read().await;
        assert_eq!(sessions.len(), 1);
        assert!(sessions.contains_key("live"));
        drop(sessions);

        store.create_session("stale", "bob", past).await.unwrap();
        assert_eq!(store.find_session("stale", Utc::now()).await.unwrap(), None);
        assert!(!store.sessions.read().await.contains_key("stale"));
    }

    #[tokio::test]
    async fn remove_recipe_references_touches_only_referencing_accounts() {
        let store = MemoryStore::new();
        let recipe = Uuid::new_v4();
        for (name, likes) in [("alice", true), ("carol", false)] {
            store
                .insert_account(new_account(name, &format!("{}@example.com", name)))
                .await
                .unwrap();
            if likes {
                let mut account = store.find_account(name).await.unwrap().unwrap();
                account.toggle_like(recipe, Utc::now());
                account.upsert_rating(recipe, 3, Utc::now());
                store.save_account(&account).await.unwrap();
            }
        }

        assert_eq!(store.ratings_for_recipe(recipe).await.unwrap(), vec![3]);
        assert_eq!(store.remove_recipe_references(recipe).await.unwrap(), 1);
        assert!(store.ratings_for_recipe(recipe).await.unwrap().is_empty());
        let alice = store.find_account("alice").await.unwrap().unwrap();
        assert!(!alice.has_liked(recipe));
    }
}
