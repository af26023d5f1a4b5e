use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{AppConfig, StorageBackend};
use crate::database::{DataStore, DatabaseManager, MemoryStore, PgStore};
use crate::integrations::{
    BlobStore, ContentChecker, DisabledContentChecker, MemoryBlobStore, OpenAiContentChecker,
    S3BlobStore,
};
use crate::middleware::SlidingWindowLimiter;
use crate::services::{AccountService, LikeService, RatingService, RecipeService};

/// Shared handles injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DataStore>,
    pub content_checker: Arc<dyn ContentChecker>,
    pub blob_store: Arc<dyn BlobStore>,
    pub create_limiter: Arc<SlidingWindowLimiter>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DataStore>,
        content_checker: Arc<dyn ContentChecker>,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        let create_limiter = SlidingWindowLimiter::new(
            config.api.recipe_create_limit,
            Duration::from_secs(config.api.recipe_create_window_secs),
        );
        Self {
            config: Arc::new(config),
            store,
            content_checker,
            blob_store,
            create_limiter: Arc::new(create_limiter),
        }
    }

    /// Memory store and memory blobs, with the given reviewer
    pub fn in_memory(config: AppConfig, content_checker: Arc<dyn ContentChecker>) -> Self {
        Self::new(
            config,
            Arc::new(MemoryStore::new()),
            content_checker,
            Arc::new(MemoryBlobStore::new()),
        )
    }

    /// Wires the collaborators selected by configuration.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn DataStore> = match &config.database.url {
            Some(_) => Arc::new(PgStore::new(DatabaseManager::connect(&config.database).await?)),
            None => {
                warn!("DATABASE_URL not set; data is kept in memory and lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let content_checker: Arc<dyn ContentChecker> = if config.content_check.enabled {
            Arc::new(OpenAiContentChecker::new(&config.content_check)?)
        } else {
            warn!("Recipe content check disabled");
            Arc::new(DisabledContentChecker)
        };

        let blob_store: Arc<dyn BlobStore> = match config.storage.backend {
            StorageBackend::S3 => Arc::new(S3BlobStore::from_config(&config.storage).await?),
            StorageBackend::Memory => {
                warn!("Image storage is in memory; uploaded images are not persisted");
                Arc::new(MemoryBlobStore::new())
            }
        };

        info!(
            "Using {} store, {:?} image storage",
            store.backend_name(),
            config.storage.backend
        );
        Ok(Self::new(config, store, content_checker, blob_store))
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.store.clone(), self.config.security.clone())
    }

    pub fn recipes(&self) -> RecipeService {
        RecipeService::new(
            self.store.clone(),
            self.content_checker.clone(),
            self.blob_store.clone(),
            self.config.api.clone(),
        )
    }

    pub fn ratings(&self) -> RatingService {
        RatingService::new(self.store.clone())
    }

    pub fn likes(&self) -> LikeService {
        LikeService::new(self.store.clone())
    }
}
