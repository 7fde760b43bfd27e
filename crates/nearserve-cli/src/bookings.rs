//! `nearserve bookings` handlers, including a live `watch` over the booking
//! subscription.

use clap::Subcommand;
use nearserve_core::{
    distance_km, round_to_tenth, AppConfig, Booking, BookingStatus, Coordinates, NewBooking,
    TransitionPolicy,
};

/// Sub-commands available under `bookings`.
#[derive(Debug, Subcommand)]
pub enum BookingCommands {
    /// Request a provider at your location
    Create {
        /// Provider id
        provider_id: String,
        #[arg(long)]
        user: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Move a booking to a new status
    Status {
        /// Booking id
        id: String,
        /// requested, accepted, en_route, arrived, completed or cancelled
        status: BookingStatus,
        /// Enforce the booking lifecycle regardless of NEARSERVE_BOOKING_TRANSITIONS
        #[arg(long)]
        guarded: bool,
    },
    /// Move the user's position on a booking
    Location {
        /// Booking id
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Record the provider's current position
    ProviderLocation {
        /// Booking id
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// List a user's bookings, newest first
    List {
        /// User id
        user: String,
    },
    /// Follow a booking live until it finishes or Ctrl-C
    Watch {
        /// Booking id
        id: String,
    },
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    command: BookingCommands,
) -> anyhow::Result<()> {
    match command {
        BookingCommands::Create {
            provider_id,
            user,
            lat,
            lng,
        } => {
            let booking = nearserve_db::create_booking(
                pool,
                &NewBooking {
                    user_id: user,
                    provider_id,
                    user_location: Coordinates::new(lat, lng),
                },
            )
            .await?;
            println!("booking {} {}", booking.id, booking.status.label());
        }
        BookingCommands::Status {
            id,
            status,
            guarded,
        } => {
            let policy = if guarded {
                TransitionPolicy::Guarded
            } else {
                config.booking_transitions
            };
            let booking = nearserve_db::update_booking_status(pool, &id, status, policy).await?;
            print_booking(&booking);
        }
        BookingCommands::Location { id, lat, lng } => {
            let booking =
                nearserve_db::update_booking_location(pool, &id, Coordinates::new(lat, lng))
                    .await?;
            print_booking(&booking);
        }
        BookingCommands::ProviderLocation { id, lat, lng } => {
            let booking =
                nearserve_db::update_provider_position(pool, &id, Coordinates::new(lat, lng))
                    .await?;
            print_booking(&booking);
        }
        BookingCommands::List { user } => {
            let bookings = nearserve_db::list_user_bookings(pool, &user).await?;
            if bookings.is_empty() {
                println!("no bookings for {user}");
            } else {
                print_booking_table(&bookings);
            }
        }
        BookingCommands::Watch { id } => run_watch(pool, &id).await?,
    }
    Ok(())
}

/// Print every change to a booking until it reaches a terminal status.
///
/// # Errors
///
/// Returns an error if the booking does not exist or the listener cannot
/// be started.
async fn run_watch(pool: &sqlx::PgPool, id: &str) -> anyhow::Result<()> {
    let mut subscription = nearserve_db::subscribe_booking(pool, id).await?;
    println!("watching booking {id}; Ctrl-C to stop");

    loop {
        tokio::select! {
            update = subscription.next() => {
                let Some(booking) = update else {
                    println!("subscription ended");
                    break;
                };
                print_booking(&booking);
                if booking.status.is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    subscription.unsubscribe();
    Ok(())
}

fn print_booking(booking: &Booking) {
    let provider_at = booking.provider_position().map(|p| {
        let gap = round_to_tenth(distance_km(booking.user_position(), p));
        format!("{p} ({gap} km away)")
    });
    println!(
        "[{}] {} {} user at {}, provider at {}",
        chrono::Utc::now().format("%H:%M:%S"),
        booking.id,
        booking.status.label(),
        booking.user_position(),
        crate::or_dash(provider_at)
    );
}

fn print_booking_table(bookings: &[Booking]) {
    let header = format!(
        "{:<38}{:<38}{:<13}{:<18}COMPLETED",
        "ID", "PROVIDER", "STATUS", "CREATED"
    );
    println!("{header}");
    for b in bookings {
        println!(
            "{:<38}{:<38}{:<13}{:<18}{}",
            b.id,
            b.provider_id,
            b.status.as_str(),
            b.created_at.format("%Y-%m-%d %H:%M").to_string(),
            crate::or_dash(b.completed_at.map(|t| t.format("%Y-%m-%d %H:%M")))
        );
    }
}
