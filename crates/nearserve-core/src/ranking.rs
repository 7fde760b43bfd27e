//! Nearby-provider ranking, multi-key sorting and text search.
//!
//! Everything here is a pure function over an already-fetched provider list;
//! callers own the I/O.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geo::{distance_km, round_to_tenth, Coordinates};
use crate::providers::{CategoryFilter, Provider};
use crate::CoreError;

pub const DEFAULT_RADIUS_KM: f64 = 50.0;

/// A provider annotated with its distance from a query origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProvider {
    #[serde(flatten)]
    pub provider: Provider,
    pub distance_km: f64,
}

impl RankedProvider {
    #[must_use]
    pub fn new(provider: Provider, origin: Coordinates) -> Self {
        let distance_km = distance_km(origin, provider.position());
        Self {
            provider,
            distance_km,
        }
    }

    /// Distance rounded to 0.1 km.
    #[must_use]
    pub fn display_distance_km(&self) -> f64 {
        round_to_tenth(self.distance_km)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub origin: Coordinates,
    pub radius_km: f64,
    pub category: CategoryFilter,
}

impl NearbyQuery {
    #[must_use]
    pub fn new(origin: Coordinates) -> Self {
        Self {
            origin,
            radius_km: DEFAULT_RADIUS_KM,
            category: CategoryFilter::All,
        }
    }

    #[must_use]
    pub fn with_radius(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: CategoryFilter) -> Self {
        self.category = category;
        self
    }

    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for a malformed origin or a radius
    /// that is not a positive finite number.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.origin.validate()?;
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "radius must be a positive number of kilometres, got {}",
                self.radius_km
            )));
        }
        Ok(())
    }
}

/// Providers within `query.radius_km` of `query.origin`, nearest first.
///
/// The category filter runs before distance annotation. The radius boundary
/// is inclusive and ties keep their input order.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] if the query fails validation. An empty
/// result is not an error.
pub fn nearby_providers(
    query: &NearbyQuery,
    providers: &[Provider],
) -> Result<Vec<RankedProvider>, CoreError> {
    query.validate()?;

    let mut ranked: Vec<RankedProvider> = providers
        .iter()
        .filter(|p| query.category.matches(p.category))
        .map(|p| RankedProvider::new(p.clone(), query.origin))
        .filter(|r| r.distance_km <= query.radius_km)
        .collect();

    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(ranked)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Highest rated first.
    #[default]
    Rating,
    /// Cheapest hourly rate first.
    Price,
    /// Nearest first.
    Distance,
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::Rating => write!(f, "rating"),
            SortKey::Price => write!(f, "price"),
            SortKey::Distance => write!(f, "distance"),
        }
    }
}

impl FromStr for SortKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rating" => Ok(SortKey::Rating),
            "price" => Ok(SortKey::Price),
            "distance" => Ok(SortKey::Distance),
            other => Err(CoreError::InvalidInput(format!(
                "unknown sort key '{other}'; expected rating, price, or distance"
            ))),
        }
    }
}

fn compare(key: SortKey, a: &RankedProvider, b: &RankedProvider) -> Ordering {
    match key {
        SortKey::Rating => b.provider.rating.total_cmp(&a.provider.rating),
        SortKey::Price => a.provider.hourly_rate.total_cmp(&b.provider.hourly_rate),
        SortKey::Distance => a.distance_km.total_cmp(&b.distance_km),
    }
}

/// Stable sort of ranked providers by `key`.
#[must_use]
pub fn sort_providers(mut providers: Vec<RankedProvider>, key: SortKey) -> Vec<RankedProvider> {
    providers.sort_by(|a, b| compare(key, a, b));
    providers
}

/// Case-insensitive substring match on name or category.
///
/// A blank query returns the input unchanged.
#[must_use]
pub fn search_providers(providers: Vec<RankedProvider>, query: &str) -> Vec<RankedProvider> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return providers;
    }

    providers
        .into_iter()
        .filter(|r| {
            r.provider.name.to_lowercase().contains(&needle)
                || r.provider.category.as_str().contains(&needle)
        })
        .collect()
}

#[cfg(test)]
#[path = "ranking_test.rs"]
mod tests;
