use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Plumber,
    Electrician,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Plumber, Category::Electrician];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Plumber => "plumber",
            Category::Electrician => "electrician",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plumber" => Ok(Category::Plumber),
            "electrician" => Ok(Category::Electrician),
            other => Err(CoreError::InvalidInput(format!(
                "unknown category '{other}'; expected 'plumber' or 'electrician'"
            ))),
        }
    }
}

/// Category restriction for a query. `All` is the "no filter" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    #[must_use]
    pub fn matches(self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => wanted == category,
        }
    }

    /// The single category to push down to the store, if any.
    #[must_use]
    pub fn category(self) -> Option<Category> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(c) => Some(c),
        }
    }
}

impl From<Option<Category>> for CategoryFilter {
    fn from(value: Option<Category>) -> Self {
        value.map_or(CategoryFilter::All, CategoryFilter::Only)
    }
}

impl FromStr for CategoryFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        trimmed.parse().map(CategoryFilter::Only)
    }
}

impl std::fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Only(c) => c.fmt(f),
        }
    }
}

/// A service provider as supplied by the provider store.
///
/// The ranker only ever reads providers; rating fields are rewritten by the
/// store after a review is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub latitude: f64,
    pub longitude: f64,
    pub hourly_rate: f64,
    /// Average review rating in `[0, 5]`, one decimal place.
    pub rating: f64,
    pub review_count: u32,
    pub available: bool,
    pub phone: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Provider {
    #[must_use]
    pub fn position(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Registration input for a provider. Rating and review count start at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProvider {
    pub name: String,
    pub phone: String,
    pub category: Category,
    #[serde(default)]
    pub bio: Option<String>,
    pub hourly_rate: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl NewProvider {
    #[must_use]
    pub fn position(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for a blank name, a negative or
    /// non-finite rate, or out-of-range coordinates.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "provider name must be non-empty".to_string(),
            ));
        }
        if !self.hourly_rate.is_finite() || self.hourly_rate < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "hourly rate for '{}' must be a non-negative number, got {}",
                self.name, self.hourly_rate
            )));
        }
        self.position().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_provider() -> NewProvider {
        NewProvider {
            name: "Rajesh Kumar".to_string(),
            phone: "+911234567890".to_string(),
            category: Category::Plumber,
            bio: None,
            hourly_rate: 500.0,
            latitude: 17.39,
            longitude: 78.4947,
        }
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Plumber".parse::<Category>().unwrap(), Category::Plumber);
        assert_eq!(
            " electrician ".parse::<Category>().unwrap(),
            Category::Electrician
        );
    }

    #[test]
    fn category_rejects_unknown() {
        let err = "carpenter".parse::<Category>().unwrap_err();
        assert!(err.to_string().contains("carpenter"));
    }

    #[test]
    fn category_display_matches_serde() {
        for c in Category::ALL {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json, format!("\"{c}\""));
        }
    }

    #[test]
    fn category_filter_all_sentinel() {
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!("".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "plumber".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(Category::Plumber)
        );
        assert!(CategoryFilter::All.matches(Category::Electrician));
        assert!(!CategoryFilter::Only(Category::Plumber).matches(Category::Electrician));
    }

    #[test]
    fn category_filter_from_option() {
        assert_eq!(CategoryFilter::from(None), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::from(Some(Category::Electrician)).category(),
            Some(Category::Electrician)
        );
    }

    #[test]
    fn new_provider_validates() {
        assert!(new_provider().validate().is_ok());
    }

    #[test]
    fn new_provider_rejects_blank_name() {
        let mut p = new_provider();
        p.name = "   ".to_string();
        assert!(p.validate().is_err());
    }

    #[test]
    fn new_provider_rejects_negative_rate() {
        let mut p = new_provider();
        p.hourly_rate = -1.0;
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("hourly rate"));
    }

    #[test]
    fn new_provider_rejects_bad_coordinates() {
        let mut p = new_provider();
        p.latitude = 123.0;
        assert!(p.validate().is_err());
    }
}
