//! Live booking updates over Postgres `LISTEN/NOTIFY`.
//!
//! The `bookings_notify_change` trigger publishes the booking id on
//! [`BOOKING_CHANNEL`] after every insert or update. A subscription listens on
//! that channel, re-reads the booking whenever its id is announced, and hands
//! each snapshot to the consumer.

use nearserve_core::Booking;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::bookings::fetch_booking;
use crate::{parse_id, DbError};

/// Notification channel written by the `bookings` trigger.
pub const BOOKING_CHANNEL: &str = "booking_updates";

const SUBSCRIPTION_BUFFER: usize = 16;

/// Handle to a running booking subscription.
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe)) stops
/// the background listener.
#[derive(Debug)]
pub struct BookingSubscription {
    booking_id: String,
    rx: mpsc::Receiver<Booking>,
    handle: JoinHandle<()>,
}

impl BookingSubscription {
    #[must_use]
    pub fn booking_id(&self) -> &str {
        &self.booking_id
    }

    /// Wait for the next snapshot of the booking.
    ///
    /// Returns `None` once the listener has stopped.
    pub async fn next(&mut self) -> Option<Booking> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for BookingSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Subscribe to changes of one booking.
///
/// The current state is delivered first, then one snapshot per change.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the booking does not exist, or
/// [`DbError::Sqlx`] if the listener connection cannot be established.
pub async fn subscribe_booking(
    pool: &PgPool,
    booking_id: &str,
) -> Result<BookingSubscription, DbError> {
    let id = parse_id("booking", booking_id)?;

    // LISTEN before the initial read so no change between the two is lost.
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(BOOKING_CHANNEL).await?;

    let initial = fetch_booking(pool, id).await?;

    let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
    // Capacity is fresh, so this cannot fail for lack of room.
    let _ = tx.try_send(initial);

    let handle = tokio::spawn(forward_changes(listener, pool.clone(), id, tx));

    tracing::debug!(booking_id = %id, "booking subscription started");

    Ok(BookingSubscription {
        booking_id: id.to_string(),
        rx,
        handle,
    })
}

async fn forward_changes(
    mut listener: PgListener,
    pool: PgPool,
    id: Uuid,
    tx: mpsc::Sender<Booking>,
) {
    let wanted = id.to_string();

    loop {
        let notification = match listener.recv().await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(booking_id = %id, error = %e, "booking listener failed");
                break;
            }
        };

        if notification.payload() != wanted {
            continue;
        }

        match fetch_booking(&pool, id).await {
            Ok(booking) => {
                if tx.send(booking).await.is_err() {
                    break;
                }
            }
            Err(DbError::NotFound) => {
                tracing::info!(booking_id = %id, "booking removed; ending subscription");
                break;
            }
            Err(e) => {
                tracing::warn!(booking_id = %id, error = %e, "failed to re-read booking");
            }
        }
    }

    tracing::debug!(booking_id = %id, "booking subscription stopped");
}
