pub mod account;
pub mod recipe;

pub use account::{Account, AccountProfile, LikedRecipe, NewAccount, RatedRecipe};
pub use recipe::{Ingredient, NewRecipe, Recipe, RecipeImage, RecipePatch, Unit};
