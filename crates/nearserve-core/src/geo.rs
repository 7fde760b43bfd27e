//! Great-circle distance on a spherical Earth.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Fallback origin when the requester's position is unknown (Hyderabad).
pub const DEFAULT_ORIGIN: Coordinates = Coordinates {
    latitude: 17.385,
    longitude: 78.4867,
};

/// A position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject non-finite values and positions outside the valid degree ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] when either component is out of range.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(CoreError::InvalidInput(format!(
                "latitude must be within [-90, 90], got {}",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(CoreError::InvalidInput(format!(
                "longitude must be within [-180, 180], got {}",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Shift by a small offset in degrees. Used to place demo providers
    /// around an origin.
    ///
    /// The result is always in range: latitude is clamped at the poles and
    /// longitude wraps across the antimeridian.
    #[must_use]
    pub fn offset(&self, d_lat: f64, d_lng: f64) -> Self {
        let latitude = (self.latitude + d_lat).clamp(-90.0, 90.0);
        let mut longitude = self.longitude + d_lng;
        if !(-180.0..=180.0).contains(&longitude) {
            longitude = (longitude + 180.0).rem_euclid(360.0) - 180.0;
        }
        Self::new(latitude, longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Haversine distance in kilometres between two lat/lng pairs.
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance in kilometres from `origin` to `target`.
#[must_use]
pub fn distance_km(origin: Coordinates, target: Coordinates) -> f64 {
    haversine_km(
        origin.latitude,
        origin.longitude,
        target.latitude,
        target.longitude,
    )
}

/// Round to 0.1 km for display. `f64::round` rounds half away from zero.
#[must_use]
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
