use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use nearserve_core::{
    nearby_providers, search_providers, sort_providers, summarize_providers, CategoryFilter,
    NearbyQuery, NewProvider, Provider, ProviderSummary, RankedProvider, SortKey,
};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_core_error, map_db_error, request_origin, ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
pub(super) struct ProviderQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub q: Option<String>,
}

struct ParsedQuery {
    category: CategoryFilter,
    sort: Option<SortKey>,
}

fn parse_query(rid: &str, params: &ProviderQuery) -> Result<ParsedQuery, ApiError> {
    let category = params
        .category
        .as_deref()
        .map(str::parse::<CategoryFilter>)
        .transpose()
        .map_err(|e| map_core_error(rid.to_owned(), &e))?
        .unwrap_or_default();
    let sort = params
        .sort
        .as_deref()
        .map(str::parse::<SortKey>)
        .transpose()
        .map_err(|e| map_core_error(rid.to_owned(), &e))?;
    Ok(ParsedQuery { category, sort })
}

/// Ranks stored providers around the request origin.
///
/// Results are nearest first unless `sort` says otherwise.
async fn rank_nearby(
    state: &AppState,
    rid: &str,
    params: &ProviderQuery,
) -> Result<Vec<RankedProvider>, ApiError> {
    let parsed = parse_query(rid, params)?;
    let origin = request_origin(rid, params.lat, params.lng, state.config.default_origin)?;

    let stored = nearserve_db::list_providers(&state.pool, parsed.category.category())
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    let query = NearbyQuery::new(origin)
        .with_radius(params.radius_km.unwrap_or(state.config.default_radius_km))
        .with_category(parsed.category);
    let mut ranked =
        nearby_providers(&query, &stored).map_err(|e| map_core_error(rid.to_owned(), &e))?;

    if let Some(q) = params.q.as_deref() {
        ranked = search_providers(ranked, q);
    }
    if let Some(key) = parsed.sort {
        ranked = sort_providers(ranked, key);
    }
    Ok(ranked)
}

/// GET /api/v1/providers/nearby
pub(super) async fn list_nearby_providers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<ProviderQuery>,
) -> Result<Json<ApiResponse<Vec<RankedProvider>>>, ApiError> {
    let ranked = rank_nearby(&state, &req_id.0, &params).await?;
    tracing::debug!(request_id = %req_id.0, results = ranked.len(), "nearby providers ranked");
    Ok(Json(ApiResponse::new(ranked, req_id.0)))
}

/// GET /api/v1/providers/summary
pub(super) async fn provider_summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<ProviderQuery>,
) -> Result<Json<ApiResponse<ProviderSummary>>, ApiError> {
    let ranked = rank_nearby(&state, &req_id.0, &params).await?;
    Ok(Json(ApiResponse::new(summarize_providers(&ranked), req_id.0)))
}

/// GET /api/v1/providers
///
/// Every stored provider with its distance from the origin and no radius
/// cut. Highest rated first unless `sort` says otherwise.
pub(super) async fn list_providers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<ProviderQuery>,
) -> Result<Json<ApiResponse<Vec<RankedProvider>>>, ApiError> {
    let rid = &req_id.0;
    let parsed = parse_query(rid, &params)?;
    let origin = request_origin(rid, params.lat, params.lng, state.config.default_origin)?;

    let stored = nearserve_db::list_providers(&state.pool, parsed.category.category())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let mut ranked: Vec<RankedProvider> = stored
        .into_iter()
        .map(|p| RankedProvider::new(p, origin))
        .collect();
    if let Some(q) = params.q.as_deref() {
        ranked = search_providers(ranked, q);
    }
    if let Some(key) = parsed.sort {
        ranked = sort_providers(ranked, key);
    }

    Ok(Json(ApiResponse::new(ranked, req_id.0)))
}

/// GET /api/v1/providers/{id}
pub(super) async fn get_provider(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Provider>>, ApiError> {
    let provider = nearserve_db::get_provider(&state.pool, &id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("provider {id} not found"),
            )
        })?;

    Ok(Json(ApiResponse::new(provider, req_id.0)))
}

/// POST /api/v1/providers
pub(super) async fn create_provider(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<NewProvider>,
) -> Result<(StatusCode, Json<ApiResponse<Provider>>), ApiError> {
    let provider = nearserve_db::insert_provider(&state.pool, &body)
        .await
        .map_err(|e| map_unique_violation(&req_id.0, &e))?;

    tracing::info!(provider_id = %provider.id, name = %provider.name, "provider registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(provider, req_id.0)),
    ))
}

fn map_unique_violation(rid: &str, e: &nearserve_db::DbError) -> ApiError {
    if let nearserve_db::DbError::Sqlx(sqlx::Error::Database(db_err)) = e {
        if db_err.is_unique_violation() {
            return ApiError::new(rid, "conflict", "a provider with that phone already exists");
        }
    }
    map_db_error(rid.to_owned(), e)
}
