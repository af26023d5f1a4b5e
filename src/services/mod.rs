pub mod account_service;
pub mod error;
pub mod like_service;
pub mod rating_service;
pub mod recipe_service;
pub mod validation;

pub use account_service::{AccountService, IssuedSession, LoginRequest, RegisterRequest};
pub use error::{ServiceError, ServiceResult};
pub use like_service::{LikeService, LikeToggle};
pub use rating_service::{OwnRating, RatingService, RatingSummary};
pub use recipe_service::{CreatedRecipe, DeletedRecipe, RecipeService};

use crate::database::models::Account;
use crate::database::DataStore;

/// Loads the account behind a session. Accounts are never deleted, so a miss is a 404.
pub(crate) async fn load_account(store: &dyn DataStore, username: &str) -> ServiceResult<Account> {
    store
        .find_account(username)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))
}
