//! Booking records and the booking status model.
//!
//! Status changes are unguarded by default: any status may be set from any
//! other. [`TransitionPolicy::Guarded`] enforces the forward-only table in
//! [`BookingStatus::can_transition_to`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    Accepted,
    EnRoute,
    Arrived,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Requested,
        BookingStatus::Accepted,
        BookingStatus::EnRoute,
        BookingStatus::Arrived,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::Accepted => "accepted",
            BookingStatus::EnRoute => "en_route",
            BookingStatus::Arrived => "arrived",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Human-readable label for status badges.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            BookingStatus::Requested => "Requested",
            BookingStatus::Accepted => "Accepted",
            BookingStatus::EnRoute => "En Route",
            BookingStatus::Arrived => "Arrived",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Forward transitions allowed under [`TransitionPolicy::Guarded`].
    #[must_use]
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::{Accepted, Arrived, Cancelled, Completed, EnRoute, Requested};
        matches!(
            (self, next),
            (Requested, Accepted | Cancelled)
                | (Accepted, EnRoute | Cancelled)
                | (EnRoute, Arrived)
                | (Arrived, Completed)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| CoreError::InvalidInput(format!("unknown booking status '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Guarded,
}

impl TransitionPolicy {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] when the policy is guarded and
    /// the table does not allow `from -> to`.
    pub fn check(self, from: BookingStatus, to: BookingStatus) -> Result<(), CoreError> {
        match self {
            TransitionPolicy::Permissive => Ok(()),
            TransitionPolicy::Guarded if from.can_transition_to(to) => Ok(()),
            TransitionPolicy::Guarded => {
                tracing::debug!(%from, %to, "rejected booking status transition");
                Err(CoreError::InvalidTransition { from, to })
            }
        }
    }
}

impl std::fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionPolicy::Permissive => write!(f, "permissive"),
            TransitionPolicy::Guarded => write!(f, "guarded"),
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "guarded" => Ok(TransitionPolicy::Guarded),
            other => Err(CoreError::InvalidInput(format!(
                "unknown transition policy '{other}'; expected 'permissive' or 'guarded'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub provider_id: String,
    pub status: BookingStatus,
    pub user_latitude: f64,
    pub user_longitude: f64,
    pub provider_latitude: Option<f64>,
    pub provider_longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Booking {
    #[must_use]
    pub fn user_position(&self) -> Coordinates {
        Coordinates::new(self.user_latitude, self.user_longitude)
    }

    #[must_use]
    pub fn provider_position(&self) -> Option<Coordinates> {
        match (self.provider_latitude, self.provider_longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }
}

/// Input for a new booking. New bookings always start as `requested`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBooking {
    pub user_id: String,
    pub provider_id: String,
    pub user_location: Coordinates,
}

impl NewBooking {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for blank ids or bad coordinates.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "user id must be non-empty".to_string(),
            ));
        }
        if self.provider_id.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "provider id must be non-empty".to_string(),
            ));
        }
        self.user_location.validate()
    }
}

/// The fields to write for a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: BookingStatus,
    /// `Some(now)` exactly when moving to `completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Decide what a status update writes, applying `policy`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidTransition`] if `policy` rejects the move.
pub fn plan_status_change(
    current: BookingStatus,
    next: BookingStatus,
    policy: TransitionPolicy,
    now: DateTime<Utc>,
) -> Result<StatusChange, CoreError> {
    policy.check(current, next)?;
    Ok(StatusChange {
        status: next,
        completed_at: (next == BookingStatus::Completed).then_some(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert_eq!(
            "en-route".parse::<BookingStatus>().unwrap(),
            BookingStatus::EnRoute
        );
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&BookingStatus::EnRoute).unwrap();
        assert_eq!(json, "\"en_route\"");
    }

    #[test]
    fn status_rejects_unknown() {
        assert!("on_hold".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn labels_are_human_readable() {
        assert_eq!(BookingStatus::EnRoute.label(), "En Route");
        assert_eq!(BookingStatus::Requested.label(), "Requested");
    }

    #[test]
    fn transition_table_matches_forward_flow() {
        use BookingStatus::*;
        let allowed = [
            (Requested, Accepted),
            (Requested, Cancelled),
            (Accepted, EnRoute),
            (Accepted, Cancelled),
            (EnRoute, Arrived),
            (Arrived, Completed),
        ];
        for from in BookingStatus::ALL {
            for to in BookingStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn guarded_policy_rejects_skipping_ahead() {
        let err = plan_status_change(
            BookingStatus::Requested,
            BookingStatus::Completed,
            TransitionPolicy::Guarded,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: BookingStatus::Requested,
                to: BookingStatus::Completed,
            }
        );
    }

    #[test]
    fn permissive_policy_allows_anything() {
        for from in BookingStatus::ALL {
            for to in BookingStatus::ALL {
                assert!(TransitionPolicy::Permissive.check(from, to).is_ok());
            }
        }
    }

    #[test]
    fn completing_sets_completed_at() {
        let now = Utc::now();
        let change = plan_status_change(
            BookingStatus::Arrived,
            BookingStatus::Completed,
            TransitionPolicy::Guarded,
            now,
        )
        .unwrap();
        assert_eq!(change.status, BookingStatus::Completed);
        assert_eq!(change.completed_at, Some(now));
    }

    #[test]
    fn other_changes_leave_completed_at_unset() {
        let change = plan_status_change(
            BookingStatus::Requested,
            BookingStatus::Accepted,
            TransitionPolicy::Permissive,
            Utc::now(),
        )
        .unwrap();
        assert!(change.completed_at.is_none());
    }

    #[test]
    fn policy_parses() {
        assert_eq!(
            "GUARDED".parse::<TransitionPolicy>().unwrap(),
            TransitionPolicy::Guarded
        );
        assert_eq!(TransitionPolicy::default(), TransitionPolicy::Permissive);
        assert!("strict".parse::<TransitionPolicy>().is_err());
    }

    #[test]
    fn new_booking_validation() {
        let booking = NewBooking {
            user_id: "user-1".to_string(),
            provider_id: String::new(),
            user_location: Coordinates::new(17.385, 78.4867),
        };
        let err = booking.validate().unwrap_err();
        assert!(err.to_string().contains("provider id"));
    }

    #[test]
    fn provider_position_requires_both_coordinates() {
        let booking = Booking {
            id: "b".to_string(),
            user_id: "u".to_string(),
            provider_id: "p".to_string(),
            status: BookingStatus::Requested,
            user_latitude: 17.385,
            user_longitude: 78.4867,
            provider_latitude: Some(17.39),
            provider_longitude: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        assert!(booking.provider_position().is_none());
        assert_eq!(booking.user_position(), Coordinates::new(17.385, 78.4867));
    }
}
