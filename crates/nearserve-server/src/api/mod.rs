mod bookings;
mod providers;
mod reviews;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use nearserve_core::{
    resolve_origin, AppConfig, Coordinates, CoreError, FixedLocation, LocationProvider,
};
use nearserve_db::DbError;
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_core_error(request_id: String, error: &CoreError) -> ApiError {
    match error {
        CoreError::InvalidInput(message) => {
            ApiError::new(request_id, "validation_error", message.clone())
        }
        CoreError::InvalidTransition { .. } => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        CoreError::EmptyAggregateSet => {
            tracing::error!(error = %error, "rating aggregation failed");
            ApiError::new(request_id, "internal_error", "rating aggregation failed")
        }
    }
}

pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound => ApiError::new(request_id, "not_found", "record not found"),
        DbError::Core(core) => map_core_error(request_id, core),
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

/// Origin for a query: explicit coordinates when both are given, else the
/// configured fallback.
pub(super) fn request_origin(
    request_id: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
    fallback: Coordinates,
) -> Result<Coordinates, ApiError> {
    let location = FixedLocation::from_parts(latitude, longitude);
    match (latitude, longitude) {
        (None, None) => Ok(resolve_origin(&location, fallback)),
        (Some(_), Some(_)) => location
            .current_location()
            .map_err(|e| ApiError::new(request_id, "validation_error", e.to_string())),
        _ => Err(ApiError::new(
            request_id,
            "validation_error",
            "lat and lng must be supplied together",
        )),
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/providers",
            get(providers::list_providers).post(providers::create_provider),
        )
        .route(
            "/api/v1/providers/nearby",
            get(providers::list_nearby_providers),
        )
        .route(
            "/api/v1/providers/summary",
            get(providers::provider_summary),
        )
        .route("/api/v1/providers/{id}", get(providers::get_provider))
        .route(
            "/api/v1/providers/{id}/reviews",
            get(reviews::list_provider_reviews).post(reviews::create_review),
        )
        .route(
            "/api/v1/users/{user_id}/reviews",
            get(reviews::list_user_reviews),
        )
        .route(
            "/api/v1/users/{user_id}/bookings",
            get(bookings::list_user_bookings),
        )
        .route("/api/v1/bookings", post(bookings::create_booking))
        .route("/api/v1/bookings/{id}", get(bookings::get_booking))
        .route(
            "/api/v1/bookings/{id}/status",
            patch(bookings::update_booking_status),
        )
        .route(
            "/api/v1/bookings/{id}/location",
            patch(bookings::update_booking_location),
        )
        .route(
            "/api/v1/bookings/{id}/provider-location",
            patch(bookings::update_provider_position),
        )
        .route(
            "/api/v1/bookings/{id}/events",
            get(bookings::booking_events),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match nearserve_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::new(
                HealthData {
                    status: "ok",
                    database: "ok",
                },
                req_id.0,
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::new(
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    req_id.0,
                )),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests;
