pub mod app_config;
pub mod bookings;
pub mod config;
pub mod geo;
pub mod location;
pub mod providers;
pub mod ranking;
pub mod ratings;
pub mod seed;

pub use app_config::{AppConfig, Environment};
pub use bookings::{
    plan_status_change, Booking, BookingStatus, NewBooking, StatusChange, TransitionPolicy,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use geo::{distance_km, haversine_km, round_to_tenth, Coordinates, DEFAULT_ORIGIN};
pub use location::{resolve_origin, FixedLocation, LocationError, LocationProvider};
pub use providers::{Category, CategoryFilter, NewProvider, Provider};
pub use ranking::{
    nearby_providers, search_providers, sort_providers, NearbyQuery, RankedProvider, SortKey,
    DEFAULT_RADIUS_KM,
};
pub use ratings::{
    recompute_average_rating, summarize_providers, NewReview, ProviderSummary, RatingAggregate,
    Review,
};
pub use seed::{load_seed_file, sample_providers, SeedFile, SeedProvider};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read seed file {path}: {source}")]
    SeedFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse seed file: {0}")]
    SeedFileParse(#[from] serde_yaml::Error),
    #[error("seed validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("cannot aggregate ratings over an empty review set")]
    EmptyAggregateSet,
    #[error("booking cannot move from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
}
