use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use nearserve_core::{NewReview, RatingAggregate, Review};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct SubmittedReview {
    pub review: Review,
    /// The provider's rating after this review was counted.
    pub provider_rating: RatingAggregate,
}

/// GET /api/v1/providers/{id}/reviews
pub(super) async fn list_provider_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Review>>>, ApiError> {
    let reviews = nearserve_db::list_reviews_by_provider(&state.pool, &id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(reviews, req_id.0)))
}

/// POST /api/v1/providers/{id}/reviews
pub(super) async fn create_review(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<NewReview>,
) -> Result<(StatusCode, Json<ApiResponse<SubmittedReview>>), ApiError> {
    let (review, aggregate) = nearserve_db::submit_review(&state.pool, &id, &body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            SubmittedReview {
                review,
                provider_rating: aggregate,
            },
            req_id.0,
        )),
    ))
}

/// GET /api/v1/users/{user_id}/reviews
pub(super) async fn list_user_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Review>>>, ApiError> {
    let reviews = nearserve_db::list_reviews_by_user(&state.pool, &user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(reviews, req_id.0)))
}
