//! Review records, rating aggregation, and provider summary statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::round_to_tenth;
use crate::providers::Category;
use crate::ranking::RankedProvider;
use crate::CoreError;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub provider_id: String,
    pub user_id: String,
    pub user_name: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub user_id: String,
    /// Display name shown next to the review. Blank names become `"Anonymous"`.
    #[serde(default)]
    pub user_name: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

impl NewReview {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] when no rating was selected (zero),
    /// the rating is above five, or the user id is blank.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.rating == 0 {
            return Err(CoreError::InvalidInput(
                "a rating must be selected".to_string(),
            ));
        }
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(CoreError::InvalidInput(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}, got {}",
                self.rating
            )));
        }
        if self.user_id.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "user id must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        let trimmed = self.user_name.trim();
        if trimmed.is_empty() {
            "Anonymous"
        } else {
            trimmed
        }
    }
}

/// Average rating and review count written back to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingAggregate {
    pub average: f64,
    pub count: u32,
}

/// Recompute a provider's rating from its complete review set.
///
/// `ratings` must include the review that was just added. The average is a
/// fresh mean over every rating, rounded to one decimal place, never an
/// update of a previous average.
///
/// # Errors
///
/// Returns [`CoreError::EmptyAggregateSet`] when `ratings` is empty.
pub fn recompute_average_rating(ratings: &[u8]) -> Result<RatingAggregate, CoreError> {
    if ratings.is_empty() {
        return Err(CoreError::EmptyAggregateSet);
    }

    let count = u32::try_from(ratings.len())
        .map_err(|_| CoreError::InvalidInput("too many reviews to aggregate".to_string()))?;
    let sum: u64 = ratings.iter().map(|&r| u64::from(r)).sum();
    #[allow(clippy::cast_precision_loss)]
    let average = round_to_tenth(sum as f64 / f64::from(count));

    Ok(RatingAggregate { average, count })
}

/// Quick statistics over a ranked result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSummary {
    pub total: usize,
    pub plumbers: usize,
    pub electricians: usize,
    pub available: usize,
    /// Mean of provider ratings, one decimal place; `0.0` for an empty set.
    pub average_rating: f64,
}

#[must_use]
pub fn summarize_providers(providers: &[RankedProvider]) -> ProviderSummary {
    let total = providers.len();
    let count_of = |category: Category| {
        providers
            .iter()
            .filter(|r| r.provider.category == category)
            .count()
    };
    let available = providers.iter().filter(|r| r.provider.available).count();

    let average_rating = if total == 0 {
        0.0
    } else {
        let sum: f64 = providers.iter().map(|r| r.provider.rating).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = sum / total as f64;
        round_to_tenth(mean)
    };

    ProviderSummary {
        total,
        plumbers: count_of(Category::Plumber),
        electricians: count_of(Category::Electrician),
        available,
        average_rating,
    }
}
