use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures::{stream, Stream, StreamExt};
use nearserve_core::{Booking, BookingStatus, Coordinates, NewBooking};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_core_error, map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct StatusUpdateRequest {
    pub status: String,
}

/// POST /api/v1/bookings
pub(super) async fn create_booking(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), ApiError> {
    let booking = nearserve_db::create_booking(&state.pool, &body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(booking, req_id.0)),
    ))
}

/// GET /api/v1/bookings/{id}
pub(super) async fn get_booking(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = nearserve_db::get_booking(&state.pool, &id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(booking, req_id.0)))
}

/// PATCH /api/v1/bookings/{id}/status
///
/// Applies the configured transition policy. A guarded policy answers
/// `409 conflict` for moves outside the lifecycle table.
pub(super) async fn update_booking_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let next = body
        .status
        .parse::<BookingStatus>()
        .map_err(|e| map_core_error(req_id.0.clone(), &e))?;

    let booking = nearserve_db::update_booking_status(
        &state.pool,
        &id,
        next,
        state.config.booking_transitions,
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(booking, req_id.0)))
}

/// PATCH /api/v1/bookings/{id}/location
///
/// Moves the user's position on the booking.
pub(super) async fn update_booking_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<Coordinates>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = nearserve_db::update_booking_location(&state.pool, &id, body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(booking, req_id.0)))
}

/// PATCH /api/v1/bookings/{id}/provider-location
pub(super) async fn update_provider_position(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<Coordinates>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = nearserve_db::update_provider_position(&state.pool, &id, body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(booking, req_id.0)))
}

/// GET /api/v1/bookings/{id}/events
///
/// Server-sent events: one `booking` event with the current state, then one
/// per change. Closing the connection ends the subscription.
pub(super) async fn booking_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = nearserve_db::subscribe_booking(&state.pool, &id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(request_id = %req_id.0, booking_id = %id, "booking event stream opened");

    let events = stream::unfold(subscription, |mut subscription| async move {
        let booking = subscription.next().await?;
        Some((booking, subscription))
    })
    .filter_map(|booking| async move {
        match Event::default().event("booking").json_data(&booking) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, error = %e, "failed to encode booking event");
                None
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// GET /api/v1/users/{user_id}/bookings
pub(super) async fn list_user_bookings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Booking>>>, ApiError> {
    let bookings = nearserve_db::list_user_bookings(&state.pool, &user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(bookings, req_id.0)))
}
