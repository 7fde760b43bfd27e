//! Database operations for the `bookings` table.

use chrono::{DateTime, Utc};
use nearserve_core::{
    plan_status_change, Booking, BookingStatus, Coordinates, CoreError, NewBooking,
    TransitionPolicy,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{parse_id, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `bookings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub user_id: String,
    pub provider_id: Uuid,
    pub status: String,
    pub user_latitude: f64,
    pub user_longitude: f64,
    pub provider_latitude: Option<f64>,
    pub provider_longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id.to_string(),
            user_id: row.user_id,
            provider_id: row.provider_id.to_string(),
            status: row.status.parse::<BookingStatus>()?,
            user_latitude: row.user_latitude,
            user_longitude: row.user_longitude,
            provider_latitude: row.provider_latitude,
            provider_longitude: row.provider_longitude,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, user_id, provider_id, status, user_latitude, user_longitude, \
     provider_latitude, provider_longitude, created_at, updated_at, completed_at";

// ---------------------------------------------------------------------------
// bookings operations
// ---------------------------------------------------------------------------

/// Creates a booking in `requested` status.
///
/// # Errors
///
/// Returns [`DbError::Core`] if the input fails validation,
/// [`DbError::NotFound`] if the provider does not exist, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn create_booking(pool: &PgPool, booking: &NewBooking) -> Result<Booking, DbError> {
    booking.validate()?;
    let provider_id = parse_id("provider", &booking.provider_id)?;

    let row = sqlx::query_as::<_, BookingRow>(&format!(
        "INSERT INTO bookings (user_id, provider_id, status, user_latitude, user_longitude) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {BOOKING_COLUMNS}"
    ))
    .bind(booking.user_id.trim())
    .bind(provider_id)
    .bind(BookingStatus::Requested.as_str())
    .bind(booking.user_location.latitude)
    .bind(booking.user_location.longitude)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => DbError::NotFound,
        other => DbError::Sqlx(other),
    })?;

    tracing::info!(booking_id = %row.id, provider_id = %provider_id, "booking created");

    Ok(Booking::try_from(row)?)
}

/// Fetches a single booking.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no booking has this id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_booking(pool: &PgPool, booking_id: &str) -> Result<Booking, DbError> {
    let id = parse_id("booking", booking_id)?;
    fetch_booking(pool, id).await
}

pub(crate) async fn fetch_booking<'e, E>(executor: E, id: Uuid) -> Result<Booking, DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, BookingRow>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(Booking::try_from(row)?)
}

/// Moves a booking to `next`, subject to `policy`.
///
/// The current status is read under a row lock so concurrent updates see a
/// consistent `from` state. `completed_at` is stamped when the booking moves
/// to `completed`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the booking does not exist,
/// [`DbError::Core`] with `InvalidTransition` if a guarded policy rejects the
/// move, or [`DbError::Sqlx`] if any statement fails.
pub async fn update_booking_status(
    pool: &PgPool,
    booking_id: &str,
    next: BookingStatus,
    policy: TransitionPolicy,
) -> Result<Booking, DbError> {
    let id = parse_id("booking", booking_id)?;

    let mut tx = pool.begin().await?;

    let current: String =
        sqlx::query_scalar::<_, String>("SELECT status FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;
    let current = current.parse::<BookingStatus>()?;

    let change = plan_status_change(current, next, policy, Utc::now())?;

    let row = sqlx::query_as::<_, BookingRow>(&format!(
        "UPDATE bookings \
         SET status = $1, completed_at = COALESCE($2, completed_at), updated_at = NOW() \
         WHERE id = $3 \
         RETURNING {BOOKING_COLUMNS}"
    ))
    .bind(change.status.as_str())
    .bind(change.completed_at)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(booking_id = %id, from = %current, to = %next, "booking status updated");

    Ok(Booking::try_from(row)?)
}

/// Moves the user's position on a booking, as when the customer corrects
/// where the provider should come to.
///
/// # Errors
///
/// Returns [`DbError::Core`] for invalid coordinates, [`DbError::NotFound`]
/// if the booking does not exist, or [`DbError::Sqlx`] if the update fails.
pub async fn update_booking_location(
    pool: &PgPool,
    booking_id: &str,
    location: Coordinates,
) -> Result<Booking, DbError> {
    let booking = write_position(
        pool,
        booking_id,
        "user_latitude = $1, user_longitude = $2",
        location,
    )
    .await?;
    tracing::debug!(booking_id = %booking.id, %location, "user location updated");
    Ok(booking)
}

/// Records the provider's live position on a booking.
///
/// # Errors
///
/// Returns [`DbError::Core`] for invalid coordinates, [`DbError::NotFound`]
/// if the booking does not exist, or [`DbError::Sqlx`] if the update fails.
pub async fn update_provider_position(
    pool: &PgPool,
    booking_id: &str,
    location: Coordinates,
) -> Result<Booking, DbError> {
    let booking = write_position(
        pool,
        booking_id,
        "provider_latitude = $1, provider_longitude = $2",
        location,
    )
    .await?;
    tracing::debug!(booking_id = %booking.id, %location, "provider position updated");
    Ok(booking)
}

// `assignments` is one of the two fixed column pairs above, never caller input.
async fn write_position(
    pool: &PgPool,
    booking_id: &str,
    assignments: &'static str,
    location: Coordinates,
) -> Result<Booking, DbError> {
    let id = parse_id("booking", booking_id)?;
    location.validate()?;

    let row = sqlx::query_as::<_, BookingRow>(&format!(
        "UPDATE bookings \
         SET {assignments}, updated_at = NOW() \
         WHERE id = $3 \
         RETURNING {BOOKING_COLUMNS}"
    ))
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(Booking::try_from(row)?)
}

/// A user's bookings, ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_bookings(pool: &PgPool, user_id: &str) -> Result<Vec<Booking>, DbError> {
    let rows = sqlx::query_as::<_, BookingRow>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings \
         WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id.trim())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| Booking::try_from(row).map_err(DbError::from))
        .collect()
}
