use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::config::{AppConfig, Environment};
use crate::database::models::{Ingredient, Recipe};
use crate::integrations::{
    ContentCheckError, ContentChecker, ContentVerdict, MemoryBlobStore,
};
use crate::services::validation::RecipeDraft;
use crate::services::{RecipeService, RegisterRequest};
use crate::state::AppState;

/// Rejects any recipe whose name or ingredients mention `forbidden`
pub struct KeywordChecker {
    pub forbidden: String,
}

#[async_trait]
impl ContentChecker for KeywordChecker {
    async fn review(
        &self,
        name: &str,
        ingredients: &[Ingredient],
    ) -> Result<ContentVerdict, ContentCheckError> {
        let needle = self.forbidden.to_lowercase();
        let flagged = name.to_lowercase().contains(&needle)
            || ingredients
                .iter()
                .any(|i| i.name.to_lowercase().contains(&needle));
        if flagged {
            Ok(ContentVerdict::Rejected(format!(
                "'{}' is not something people eat.",
                self.forbidden
            )))
        } else {
            Ok(ContentVerdict::Approved)
        }
    }
}

/// Simulates an unreachable reviewer
pub struct UnreachableChecker;

#[async_trait]
impl ContentChecker for UnreachableChecker {
    async fn review(
        &self,
        _name: &str,
        _ingredients: &[Ingredient],
    ) -> Result<ContentVerdict, ContentCheckError> {
        Err(ContentCheckError::Request("connection refused".to_string()))
    }
}

/// In-memory application state for service-level tests
pub struct TestContext {
    pub state: AppState,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_checker(Arc::new(KeywordChecker {
            forbidden: "gravel".to_string(),
        }))
    }

    pub fn with_checker(checker: Arc<dyn ContentChecker>) -> Self {
        let mut config = AppConfig::for_environment(Environment::Development);
        config.security.bcrypt_cost = 4;

        let blobs = Arc::new(MemoryBlobStore::new());
        let state = AppState::new(
            config,
            Arc::new(crate::database::MemoryStore::new()),
            checker,
            blobs.clone(),
        );
        Self { state, blobs }
    }

    pub fn recipes(&self) -> RecipeService {
        self.state.recipes()
    }

    /// Registers `username` with password "password"
    pub async fn register(&self, username: &str) -> anyhow::Result<()> {
        let request = RegisterRequest {
            name: Some(username.to_string()),
            username: Some(username.to_string()),
            email: Some(format!("{}@example.com", username)),
            password: Some("password".to_string()),
        };
        self.state
            .accounts()
            .register(&request, false)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to register {}: {}", username, e))?;
        Ok(())
    }

    pub async fn create_recipe(&self, owner: &str, name: &str) -> anyhow::Result<Recipe> {
        let created = self
            .recipes()
            .create(owner, &draft(name), Vec::new())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create recipe {}: {}", name, e))?;
        Ok(created.recipe)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A valid two-ingredient draft
pub fn draft(name: &str) -> RecipeDraft {
    RecipeDraft {
        name: Some(name.to_string()),
        description: None,
        ingredients: Some(json!([
            { "name": "spaghetti", "quantity": 200, "unit": "g" },
            { "name": "garlic", "quantity": 2, "unit": "clove", "notes": "minced" }
        ])),
        instructions: Some(json!(["Boil the pasta", { "Steps": "Toss with garlic" }])),
        difficulty: Some(json!(2)),
        time: Some(json!("20 minutes")),
    }
}
