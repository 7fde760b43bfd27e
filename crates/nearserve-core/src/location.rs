//! Requester position lookup with a fixed fallback origin.

use thiserror::Error;

use crate::geo::Coordinates;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Source of the requester's current position.
pub trait LocationProvider {
    /// # Errors
    ///
    /// Returns [`LocationError`] when no position can be determined.
    fn current_location(&self) -> Result<Coordinates, LocationError>;
}

/// A position supplied up front by the caller (CLI flags, query parameters).
///
/// `None` behaves like a device that refused to share its location.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixedLocation(pub Option<Coordinates>);

impl FixedLocation {
    #[must_use]
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => Self(Some(Coordinates::new(lat, lng))),
            _ => Self(None),
        }
    }
}

impl LocationProvider for FixedLocation {
    fn current_location(&self) -> Result<Coordinates, LocationError> {
        let coords = self.0.ok_or(LocationError::PermissionDenied)?;
        coords
            .validate()
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;
        Ok(coords)
    }
}

/// The provider's position, or `fallback` when it cannot supply one.
pub fn resolve_origin<P: LocationProvider + ?Sized>(
    provider: &P,
    fallback: Coordinates,
) -> Coordinates {
    match provider.current_location() {
        Ok(coords) => coords,
        Err(e) => {
            tracing::warn!(error = %e, %fallback, "using fallback origin");
            fallback
        }
    }
}
