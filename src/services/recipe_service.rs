use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::load_account;
use super::validation::{self, ImageUpload, RecipeDraft};
use crate::config::ApiConfig;
use crate::database::models::{Ingredient, Recipe, RecipeImage};
use crate::database::DataStore;
use crate::integrations::{BlobStore, ContentChecker, ContentVerdict, PutOpts};

#[derive(Debug, Clone)]
pub struct CreatedRecipe {
    pub recipe: Recipe,
    pub images_uploaded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedRecipe {
    pub images_deleted: usize,
    pub accounts_updated: u64,
}

/// Recipe lifecycle: creation with images, owner-only edits and deletion, and the read paths.
pub struct RecipeService {
    store: Arc<dyn DataStore>,
    checker: Arc<dyn ContentChecker>,
    blobs: Arc<dyn BlobStore>,
    limits: ApiConfig,
}

impl RecipeService {
    pub fn new(
        store: Arc<dyn DataStore>,
        checker: Arc<dyn ContentChecker>,
        blobs: Arc<dyn BlobStore>,
        limits: ApiConfig,
    ) -> Self {
        Self {
            store,
            checker,
            blobs,
            limits,
        }
    }

    pub async fn create(
        &self,
        username: &str,
        draft: &RecipeDraft,
        images: Vec<ImageUpload>,
    ) -> ServiceResult<CreatedRecipe> {
        let new = validation::new_recipe(draft)?;
        validation::validate_images(
            &images,
            self.limits.max_images_per_recipe,
            self.limits.max_image_size_bytes,
        )?;
        self.review(&new.name, &new.ingredients).await?;

        let mut recipe = Recipe::create(Uuid::new_v4(), username, new, Utc::now());
        self.store.insert_recipe(&recipe).await?;

        if !images.is_empty() {
            // The document already exists; a failed upload leaves it without images.
            recipe.images = self.upload_images(recipe.id, username, images).await?;
            self.store.update_recipe(&recipe).await?;
        }

        info!("New recipe {} created by: {}", recipe.id, username);
        let images_uploaded = recipe.images.len();
        Ok(CreatedRecipe {
            recipe,
            images_uploaded,
        })
    }

    pub async fn update(&self, username: &str, id: Uuid, draft: &RecipeDraft) -> ServiceResult<Recipe> {
        let mut recipe = self.find_owned(username, id, "You can only update your own recipes").await?;
        let patch = validation::recipe_patch(draft)?;

        let name = patch.name.as_deref().unwrap_or(&recipe.name);
        let ingredients = patch.ingredients.as_deref().unwrap_or(&recipe.ingredients);
        self.review(name, ingredients).await?;

        recipe.apply(patch, Utc::now());
        self.store.update_recipe(&recipe).await?;

        info!("Recipe {} updated by: {}", id, username);
        Ok(recipe)
    }

    /// Removes stored images, then every account's references, then the document.
    pub async fn delete(&self, username: &str, id: Uuid) -> ServiceResult<DeletedRecipe> {
        let recipe = self.find_owned(username, id, "You can only delete your own recipes").await?;

        try_join_all(recipe.images.iter().map(|image| self.blobs.delete(&image.key))).await?;
        let accounts_updated = self.store.remove_recipe_references(id).await?;
        if !self.store.delete_recipe(id).await? {
            warn!("Recipe {} vanished during delete", id);
        }

        info!("Recipe {} deleted by: {}", id, username);
        Ok(DeletedRecipe {
            images_deleted: recipe.images.len(),
            accounts_updated,
        })
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Recipe> {
        self.store
            .find_recipe(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Recipe not found"))
    }

    pub async fn list(&self) -> ServiceResult<Vec<Recipe>> {
        Ok(self.store.list_recipes().await?)
    }

    pub async fn list_by_creator(&self, username: &str) -> ServiceResult<Vec<Recipe>> {
        Ok(self.store.list_recipes_by_creator(username).await?)
    }

    /// Recipes the caller liked, in like order. Likes pointing at deleted recipes are skipped.
    pub async fn liked_recipes(&self, username: &str) -> ServiceResult<Vec<Recipe>> {
        let account = load_account(self.store.as_ref(), username).await?;
        let ids: Vec<Uuid> = account.liked_recipes.iter().map(|like| like.recipe_id).collect();
        Ok(self.store.find_recipes(&ids).await?)
    }

    async fn find_owned(&self, username: &str, id: Uuid, denied: &str) -> ServiceResult<Recipe> {
        let recipe = self.get(id).await?;
        if !recipe.is_owned_by(username) {
            warn!("{} attempted to modify recipe {} owned by {}", username, id, recipe.creator);
            return Err(ServiceError::forbidden(denied));
        }
        Ok(recipe)
    }

    async fn review(&self, name: &str, ingredients: &[Ingredient]) -> ServiceResult<()> {
        match self.checker.review(name, ingredients).await {
            Ok(ContentVerdict::Approved) => Ok(()),
            Ok(ContentVerdict::Rejected(reason)) => {
                info!("Recipe '{}' rejected by content check", name);
                Err(ServiceError::ContentRejected(reason))
            }
            Err(e) => {
                error!("Content check failed: {}", e);
                Err(ServiceError::ContentCheckFailed(e))
            }
        }
    }

    async fn upload_images(
        &self,
        recipe_id: Uuid,
        username: &str,
        images: Vec<ImageUpload>,
    ) -> ServiceResult<Vec<RecipeImage>> {
        let mut uploaded = Vec::with_capacity(images.len());
        for image in images {
            let key = format!("recipes/{}/{}.{}", recipe_id, Uuid::new_v4(), image.extension());
            let uploaded_at = Utc::now();
            let metadata = HashMap::from([
                ("recipe-id".to_string(), recipe_id.to_string()),
                ("uploaded-by".to_string(), username.to_string()),
                ("upload-date".to_string(), uploaded_at.to_rfc3339()),
            ]);
            let opts = PutOpts {
                content_type: Some(image.content_type.clone()),
                metadata,
            };

            let stored = match self.blobs.put(&key, image.data, opts).await {
                Ok(stored) => stored,
                Err(e) => {
                    error!("Image upload for recipe {} failed: {}", recipe_id, e);
                    self.discard_uploads(&uploaded).await;
                    return Err(e.into());
                }
            };
            uploaded.push(RecipeImage {
                url: stored.url,
                key: stored.key,
                uploaded_at,
            });
        }
        Ok(uploaded)
    }

    /// Best-effort removal of objects stored before a failed upload.
    async fn discard_uploads(&self, uploaded: &[RecipeImage]) {
        for image in uploaded {
            if let Err(e) = self.blobs.delete(&image.key).await {
                warn!("Could not remove orphaned image {}: {}", image.key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{BlobError, MemoryBlobStore, StoredObject};
    use crate::testing::{draft, TestContext, UnreachableChecker};
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stores objects until the `fail_on`-th put, which fails
    struct FailingBlobStore {
        inner: Arc<MemoryBlobStore>,
        fail_on: usize,
        puts: AtomicUsize,
    }

    #[async_trait]
    impl BlobStore for FailingBlobStore {
        async fn put(&self, key: &str, body: Bytes, opts: PutOpts) -> Result<StoredObject, BlobError> {
            if self.puts.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(BlobError::ProviderUnavailable("bucket offline".to_string()));
            }
            self.inner.put(key, body, opts).await
        }

        async fn delete(&self, key: &str) -> Result<(), BlobError> {
            self.inner.delete(key).await
        }
    }

    fn service_with(
        ctx: &TestContext,
        checker: Arc<dyn ContentChecker>,
        blobs: Arc<dyn BlobStore>,
    ) -> RecipeService {
        RecipeService::new(ctx.state.store.clone(), checker, blobs, ctx.state.config.api.clone())
    }

    fn png(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: Some(name.to_string()),
            content_type: "image/png".to_string(),
            data: Bytes::from_static(b"\x89PNG fake"),
        }
    }

    #[tokio::test]
    async fn create_stores_images_under_recipe_prefix() {
        let ctx = TestContext::new();
        ctx.register("alice").await.unwrap();

        let created = ctx
            .recipes()
            .create("alice", &draft("Aglio e olio"), vec![png("plate.PNG"), png("pan.png")])
            .await
            .unwrap();

        assert_eq!(created.images_uploaded, 2);
        assert_eq!(created.recipe.creator, "alice");
        assert_eq!(created.recipe.likes, 0);
        for image in &created.recipe.images {
            assert!(image.key.starts_with(&format!("recipes/{}/", created.recipe.id)));
            assert!(image.key.ends_with(".png"));
            assert!(ctx.blobs.contains(&image.key));
            let metadata = ctx.blobs.metadata(&image.key).unwrap();
            assert_eq!(metadata["uploaded-by"], "alice");
            assert_eq!(metadata["recipe-id"], created.recipe.id.to_string());
        }

        let stored = ctx.recipes().get(created.recipe.id).await.unwrap();
        assert_eq!(stored.images.len(), 2);
    }

    #[tokio::test]
    async fn create_rejected_content_persists_nothing() {
        let ctx = TestContext::new();
        ctx.register("alice").await.unwrap();

        let err = ctx
            .recipes()
            .create("alice", &draft("Gravel soup"), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ContentRejected(_)));
        assert!(ctx.recipes().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_fails_closed_when_reviewer_unreachable() {
        let ctx = TestContext::with_checker(Arc::new(UnreachableChecker));
        ctx.register("alice").await.unwrap();

        let err = ctx
            .recipes()
            .create("alice", &draft("Toast"), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ContentCheckFailed(_)));
        assert!(ctx.recipes().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_keeps_recipe_without_images_and_no_orphans() {
        let ctx = TestContext::new();
        ctx.register("alice").await.unwrap();
        let blobs = Arc::new(FailingBlobStore {
            inner: ctx.blobs.clone(),
            fail_on: 2,
            puts: AtomicUsize::new(0),
        });
        let service = service_with(&ctx, ctx.state.content_checker.clone(), blobs);

        let err = service
            .create("alice", &draft("Bao"), vec![png("one.png"), png("two.png"), png("three.png")])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));

        // The first object was stored, then removed again
        assert!(ctx.blobs.is_empty());
        let recipes = ctx.recipes().list().await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert!(recipes[0].images.is_empty());
    }

    #[tokio::test]
    async fn update_fails_closed_when_reviewer_unreachable() {
        let ctx = TestContext::new();
        ctx.register("alice").await.unwrap();
        let recipe = ctx.create_recipe("alice", "Pancakes").await.unwrap();
        let service = service_with(&ctx, Arc::new(UnreachableChecker), ctx.blobs.clone());

        let patch = RecipeDraft {
            name: Some("Crepes".to_string()),
            ..Default::default()
        };
        let err = service.update("alice", recipe.id, &patch).await.unwrap_err();
        assert!(matches!(err, ServiceError::ContentCheckFailed(_)));
        assert_eq!(crate::error::ApiError::from(err).error_code(), "UPSTREAM_ERROR");

        let stored = ctx.recipes().get(recipe.id).await.unwrap();
        assert_eq!(stored, recipe);
    }

    #[tokio::test]
    async fn update_requires_ownership() {
        let ctx = TestContext::new();
        ctx.register("alice").await.unwrap();
        ctx.register("bob").await.unwrap();
        let recipe = ctx.create_recipe("alice", "Pancakes").await.unwrap();

        let patch = RecipeDraft {
            name: Some("Bob's pancakes".to_string()),
            ..Default::default()
        };
        let err = ctx.recipes().update("bob", recipe.id, &patch).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(ref m) if m == "You can only update your own recipes"));

        let updated = ctx.recipes().update("alice", recipe.id, &patch).await.unwrap();
        assert_eq!(updated.name, "Bob's pancakes");
        assert_eq!(updated.ingredients, recipe.ingredients);
        assert_eq!(updated.created_at, recipe.created_at);
    }

    #[tokio::test]
    async fn update_with_empty_ingredients_leaves_recipe_untouched() {
        let ctx = TestContext::new();
        ctx.register("alice").await.unwrap();
        let recipe = ctx.create_recipe("alice", "Pancakes").await.unwrap();

        let patch = RecipeDraft {
            ingredients: Some(json!([])),
            ..Default::default()
        };
        let err = ctx.recipes().update("alice", recipe.id, &patch).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let stored = ctx.recipes().get(recipe.id).await.unwrap();
        assert_eq!(stored, recipe);
    }

    #[tokio::test]
    async fn update_reviews_the_effective_ingredients() {
        let ctx = TestContext::new();
        ctx.register("alice").await.unwrap();
        let recipe = ctx.create_recipe("alice", "Pancakes").await.unwrap();

        let patch = RecipeDraft {
            ingredients: Some(json!([{ "name": "gravel", "quantity": 1, "unit": "cup" }])),
            ..Default::default()
        };
        let err = ctx.recipes().update("alice", recipe.id, &patch).await.unwrap_err();
        assert!(matches!(err, ServiceError::ContentRejected(_)));
    }

    #[tokio::test]
    async fn delete_removes_images_and_references() {
        let ctx = TestContext::new();
        ctx.register("alice").await.unwrap();
        ctx.register("bob").await.unwrap();
        let created = ctx
            .recipes()
            .create("alice", &draft("Focaccia"), vec![png("top.png")])
            .await
            .unwrap();
        let id = created.recipe.id;
        ctx.state.likes().toggle_like("bob", id).await.unwrap();
        ctx.state
            .ratings()
            .submit_rating("bob", id, Some(&json!(5)))
            .await
            .unwrap();

        let err = ctx.recipes().delete("bob", id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let deleted = ctx.recipes().delete("alice", id).await.unwrap();
        assert_eq!(deleted.images_deleted, 1);
        assert_eq!(deleted.accounts_updated, 1);
        assert!(ctx.blobs.is_empty());
        assert!(ctx.recipes().liked_recipes("bob").await.unwrap().is_empty());

        let rating = ctx.state.ratings().get_rating("bob", id).await.unwrap();
        assert_eq!(rating.rating, None);
        assert!(matches!(
            ctx.recipes().get(id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn list_by_creator_filters_owner() {
        let ctx = TestContext::new();
        ctx.register("alice").await.unwrap();
        ctx.register("bob").await.unwrap();
        ctx.create_recipe("alice", "Soup").await.unwrap();
        ctx.create_recipe("bob", "Stew").await.unwrap();

        let mine = ctx.recipes().list_by_creator("alice").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Soup");
        assert_eq!(ctx.recipes().list().await.unwrap().len(), 2);
    }
}
