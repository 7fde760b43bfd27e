use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::providers::{Category, NewProvider};
use crate::ConfigError;

/// A provider to seed, optionally with a pre-existing rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedProvider {
    #[serde(flatten)]
    pub provider: NewProvider,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub providers: Vec<SeedProvider>,
}

/// Load and validate seed providers from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_seed_file(path: &Path) -> Result<SeedFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let seed_file: SeedFile = serde_yaml::from_str(&content)?;
    validate_seed(&seed_file.providers)?;

    Ok(seed_file)
}

fn validate_seed(providers: &[SeedProvider]) -> Result<(), ConfigError> {
    let mut seen_phones = HashSet::new();

    for seed in providers {
        seed.provider
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if let Some(rating) = seed.rating {
            if !(0.0..=5.0).contains(&rating) {
                return Err(ConfigError::Validation(format!(
                    "provider '{}' has rating {rating}; must be within 0-5",
                    seed.provider.name
                )));
            }
        }

        let phone = seed.provider.phone.trim().to_string();
        if !phone.is_empty() && !seen_phones.insert(phone.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate provider phone: '{phone}' (from provider '{}')",
                seed.provider.name
            )));
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn demo(
    origin: Coordinates,
    name: &str,
    phone: &str,
    category: Category,
    bio: &str,
    hourly_rate: f64,
    (d_lat, d_lng): (f64, f64),
    (rating, review_count): (f64, u32),
) -> SeedProvider {
    let position = origin.offset(d_lat, d_lng);
    SeedProvider {
        provider: NewProvider {
            name: name.to_string(),
            phone: phone.to_string(),
            category,
            bio: Some(bio.to_string()),
            hourly_rate,
            latitude: position.latitude,
            longitude: position.longitude,
        },
        rating: Some(rating),
        review_count: Some(review_count),
    }
}

/// Six demo providers scattered within a few kilometres of `origin`.
#[must_use]
pub fn sample_providers(origin: Coordinates) -> Vec<SeedProvider> {
    vec![
        demo(
            origin,
            "Rajesh Kumar",
            "+911234567890",
            Category::Plumber,
            "Experienced plumber with 10+ years of service. Specializing in pipe repair, bathroom fitting, and water heater installation.",
            500.0,
            (0.005, 0.008),
            (4.5, 23),
        ),
        demo(
            origin,
            "Suresh Electricals",
            "+911234567891",
            Category::Electrician,
            "Licensed electrician handling wiring, fuse box repairs, fan installation, and switchboard work.",
            600.0,
            (-0.008, 0.003),
            (4.8, 45),
        ),
        demo(
            origin,
            "Quick Fix Plumbing",
            "+911234567892",
            Category::Plumber,
            "Fast and reliable plumbing services. Emergency services available 24/7.",
            450.0,
            (0.012, -0.006),
            (4.2, 18),
        ),
        demo(
            origin,
            "PowerLine Solutions",
            "+911234567893",
            Category::Electrician,
            "Professional electrical services including home wiring, inverter setup, and generator maintenance.",
            700.0,
            (-0.003, -0.010),
            (4.6, 32),
        ),
        demo(
            origin,
            "Amit Plumbing Works",
            "+911234567894",
            Category::Plumber,
            "Affordable plumbing solutions for homes and offices. Drainage cleaning and kitchen sink repairs.",
            400.0,
            (0.018, 0.015),
            (3.9, 12),
        ),
        demo(
            origin,
            "Bright Spark Electricals",
            "+911234567895",
            Category::Electrician,
            "Expert in smart home wiring, CCTV installation, and electrical safety audits.",
            800.0,
            (-0.015, 0.012),
            (4.9, 56),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{distance_km, DEFAULT_ORIGIN};

    #[test]
    fn samples_are_valid_and_close_to_origin() {
        let samples = sample_providers(DEFAULT_ORIGIN);
        assert_eq!(samples.len(), 6);
        assert!(validate_seed(&samples).is_ok());
        for s in &samples {
            let d = distance_km(DEFAULT_ORIGIN, s.provider.position());
            assert!(d < 5.0, "{} is {d} km away", s.provider.name);
        }
    }

    #[test]
    fn samples_near_antimeridian_and_pole_stay_valid() {
        for origin in [
            Coordinates::new(-17.7, 179.995),
            Coordinates::new(-17.7, -179.995),
            Coordinates::new(89.995, 10.0),
        ] {
            let samples = sample_providers(origin);
            assert!(validate_seed(&samples).is_ok(), "origin {origin}");
        }
    }

    #[test]
    fn samples_cover_both_categories() {
        let samples = sample_providers(DEFAULT_ORIGIN);
        let plumbers = samples
            .iter()
            .filter(|s| s.provider.category == Category::Plumber)
            .count();
        assert_eq!(plumbers, 3);
    }

    #[test]
    fn validate_rejects_duplicate_phone() {
        let mut samples = sample_providers(DEFAULT_ORIGIN);
        samples[1].provider.phone = samples[0].provider.phone.clone();
        let err = validate_seed(&samples).unwrap_err();
        assert!(err.to_string().contains("duplicate provider phone"));
    }

    #[test]
    fn validate_rejects_rating_out_of_range() {
        let mut samples = sample_providers(DEFAULT_ORIGIN);
        samples[0].rating = Some(5.5);
        let err = validate_seed(&samples).unwrap_err();
        assert!(err.to_string().contains("must be within 0-5"));
    }

    #[test]
    fn parses_yaml_with_optional_rating() {
        let yaml = r"
providers:
  - name: Test Plumber
    phone: '+910000000000'
    category: plumber
    hourly_rate: 350
    latitude: 17.39
    longitude: 78.49
  - name: Test Electrician
    phone: '+910000000001'
    category: electrician
    bio: Wiring
    hourly_rate: 650
    latitude: 17.38
    longitude: 78.48
    rating: 4.4
    review_count: 9
";
        let file: SeedFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.providers.len(), 2);
        assert!(file.providers[0].rating.is_none());
        assert_eq!(file.providers[1].review_count, Some(9));
        assert!(validate_seed(&file.providers).is_ok());
    }

    #[test]
    fn load_seed_file_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("providers.yaml");
        assert!(
            path.exists(),
            "providers.yaml missing at {path:?}; required for this test"
        );
        let result = load_seed_file(&path);
        assert!(result.is_ok(), "failed to load providers.yaml: {result:?}");
        assert!(!result.unwrap().providers.is_empty());
    }

    #[test]
    fn load_seed_file_missing_path_is_io_error() {
        let err = load_seed_file(Path::new("/nonexistent/providers.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::SeedFileIo { .. }));
    }
}
