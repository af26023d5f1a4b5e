use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::validation::validate_rating;
use super::load_account;
use crate::database::DataStore;

/// Outcome of a rating submission: the caller's rating and the recipe's new aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub your_rating: u8,
    pub rating: Option<f64>,
    pub rating_count: u32,
}

/// The caller's own rating of a recipe; both fields are null until rated
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnRating {
    pub rating: Option<u8>,
    pub rated_at: Option<DateTime<Utc>>,
}

pub struct RatingService {
    store: Arc<dyn DataStore>,
}

impl RatingService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Records `username`'s rating and recomputes the recipe's mean and count
    /// from every account's ratings.
    pub async fn submit_rating(
        &self,
        username: &str,
        recipe_id: Uuid,
        rating: Option<&Value>,
    ) -> ServiceResult<RatingSummary> {
        let rating = validate_rating(rating)?;

        if self.store.find_recipe(recipe_id).await?.is_none() {
            return Err(ServiceError::not_found("Recipe not found"));
        }

        let mut account = load_account(self.store.as_ref(), username).await?;
        account.upsert_rating(recipe_id, rating, Utc::now());
        self.store.save_account(&account).await?;

        let ratings = self.store.ratings_for_recipe(recipe_id).await?;
        let (average, count) = aggregate(&ratings);
        self.store.set_rating_stats(recipe_id, average, count).await?;

        info!("Recipe {} rated {} by {} (now {:?} over {})", recipe_id, rating, username, average, count);

        Ok(RatingSummary {
            your_rating: rating,
            rating: average,
            rating_count: count,
        })
    }

    pub async fn get_rating(&self, username: &str, recipe_id: Uuid) -> ServiceResult<OwnRating> {
        let account = load_account(self.store.as_ref(), username).await?;
        let entry = account.rating_for(recipe_id);
        Ok(OwnRating {
            rating: entry.map(|e| e.rating),
            rated_at: entry.map(|e| e.rated_at),
        })
    }
}

/// Mean rounded to one decimal (half away from zero) and the number of ratings.
pub fn aggregate(ratings: &[u8]) -> (Option<f64>, u32) {
    if ratings.is_empty() {
        return (None, 0);
    }
    let count = ratings.len() as u32;
    let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
    let mean = (Decimal::from(sum) / Decimal::from(count))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    (mean.to_f64(), count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_rounds_to_one_decimal() {
        assert_eq!(aggregate(&[]), (None, 0));
        assert_eq!(aggregate(&[4]), (Some(4.0), 1));
        assert_eq!(aggregate(&[4, 5]), (Some(4.5), 2));
        assert_eq!(aggregate(&[2, 5]), (Some(3.5), 2));
        assert_eq!(aggregate(&[1, 2, 2]), (Some(1.7), 3));
        assert_eq!(aggregate(&[1, 2, 2, 2]), (Some(1.8), 4));
        assert_eq!(aggregate(&[5, 5, 4]), (Some(4.7), 3));
    }
}
