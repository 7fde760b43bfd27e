use super::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use nearserve_core::{
    sample_providers, Environment, TransitionPolicy, DEFAULT_ORIGIN, DEFAULT_RADIUS_KM,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tower::ServiceExt;

fn test_config(transitions: TransitionPolicy) -> Arc<AppConfig> {
    Arc::new(AppConfig {
        database_url: "postgres://test".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        seed_path: PathBuf::from("./config/providers.yaml"),
        default_origin: DEFAULT_ORIGIN,
        default_radius_km: DEFAULT_RADIUS_KM,
        booking_transitions: transitions,
        db_max_connections: 5,
        db_min_connections: 1,
        db_acquire_timeout_secs: 5,
    })
}

fn app(pool: sqlx::PgPool, transitions: TransitionPolicy) -> Router {
    let auth = AuthState::from_keys("", true).expect("auth");
    build_app(
        AppState {
            pool,
            config: test_config(transitions),
        },
        auth,
        default_rate_limit_state(),
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).expect("json parse")
    };
    (status, json)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn json_request(method: Method, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn seed(pool: &sqlx::PgPool) {
    nearserve_db::seed_providers(pool, &sample_providers(DEFAULT_ORIGIN))
        .await
        .expect("seed providers");
}

async fn first_provider_id(pool: &sqlx::PgPool) -> String {
    nearserve_db::list_providers(pool, None)
        .await
        .expect("list providers")
        .into_iter()
        .next()
        .expect("at least one provider")
        .id
}

// ---------------------------------------------------------------------------
// Offline
// ---------------------------------------------------------------------------

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn api_error_conflict_maps_to_409() {
    let response = ApiError::new("req-1", "conflict", "nope").into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[test]
fn db_not_found_maps_to_not_found() {
    let err = map_db_error("req-1".to_string(), &DbError::NotFound);
    assert_eq!(err.error.code, "not_found");
}

#[test]
fn invalid_transition_maps_to_conflict() {
    let err = map_core_error(
        "req-1".to_string(),
        &CoreError::InvalidTransition {
            from: nearserve_core::BookingStatus::Requested,
            to: nearserve_core::BookingStatus::Completed,
        },
    );
    assert_eq!(err.error.code, "conflict");
}

#[test]
fn request_origin_falls_back_without_coordinates() {
    let origin = request_origin("req-1", None, None, DEFAULT_ORIGIN).unwrap();
    assert_eq!(origin, DEFAULT_ORIGIN);
}

#[test]
fn request_origin_uses_explicit_coordinates() {
    let origin = request_origin("req-1", Some(12.9716), Some(77.5946), DEFAULT_ORIGIN).unwrap();
    assert_eq!(origin, Coordinates::new(12.9716, 77.5946));
}

#[test]
fn request_origin_rejects_half_a_position() {
    let err = request_origin("req-1", Some(12.0), None, DEFAULT_ORIGIN).unwrap_err();
    assert_eq!(err.error.code, "validation_error");
}

#[test]
fn request_origin_rejects_out_of_range() {
    let err = request_origin("req-1", Some(95.0), Some(10.0), DEFAULT_ORIGIN).unwrap_err();
    assert_eq!(err.error.code, "validation_error");
}

// ---------------------------------------------------------------------------
// Live
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn health_reports_ok_and_echoes_request_id(pool: sqlx::PgPool) {
    let request = Request::builder()
        .uri("/api/v1/health")
        .header("x-request-id", "req-health")
        .body(Body::empty())
        .expect("request");
    let response = app(pool, TransitionPolicy::Permissive)
        .oneshot(request)
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-health"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["meta"]["request_id"], "req-health");
}

#[sqlx::test(migrations = "../../migrations")]
async fn nearby_returns_nearest_first_with_distance(pool: sqlx::PgPool) {
    seed(&pool).await;

    let (status, json) = send(
        app(pool, TransitionPolicy::Permissive),
        get_request("/api/v1/providers/nearby?lat=17.385&lng=78.4867"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().expect("data array");
    assert_eq!(data.len(), 6);
    let distances: Vec<f64> = data
        .iter()
        .map(|p| p["distance_km"].as_f64().expect("distance_km"))
        .collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    assert!(data[0]["name"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn nearby_filters_by_category_and_sorts_by_price(pool: sqlx::PgPool) {
    seed(&pool).await;

    let (status, json) = send(
        app(pool, TransitionPolicy::Permissive),
        get_request("/api/v1/providers/nearby?category=plumber&sort=price"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().expect("data array");
    assert_eq!(data.len(), 3);
    assert!(data.iter().all(|p| p["category"] == "plumber"));
    let rates: Vec<f64> = data
        .iter()
        .map(|p| p["hourly_rate"].as_f64().unwrap())
        .collect();
    assert!(rates.windows(2).all(|w| w[0] <= w[1]));
}

#[sqlx::test(migrations = "../../migrations")]
async fn nearby_empty_result_is_ok(pool: sqlx::PgPool) {
    seed(&pool).await;

    // Mumbai is far outside a 10 km radius of every seeded provider.
    let (status, json) = send(
        app(pool, TransitionPolicy::Permissive),
        get_request("/api/v1/providers/nearby?lat=19.076&lng=72.8777&radius_km=10"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn nearby_rejects_bad_radius_and_category(pool: sqlx::PgPool) {
    let (status, json) = send(
        app(pool.clone(), TransitionPolicy::Permissive),
        get_request("/api/v1/providers/nearby?radius_km=-1"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let (status, _) = send(
        app(pool, TransitionPolicy::Permissive),
        get_request("/api/v1/providers/nearby?category=carpenter"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn summary_counts_categories(pool: sqlx::PgPool) {
    seed(&pool).await;

    let (status, json) = send(
        app(pool, TransitionPolicy::Permissive),
        get_request("/api/v1/providers/summary"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 6);
    assert_eq!(json["data"]["plumbers"], 3);
    assert_eq!(json["data"]["electricians"], 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_providers_searches_by_name(pool: sqlx::PgPool) {
    seed(&pool).await;

    let (status, json) = send(
        app(pool, TransitionPolicy::Permissive),
        get_request("/api/v1/providers?q=spark"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["name"], "Bright Spark Electricals");
}

#[sqlx::test(migrations = "../../migrations")]
async fn register_then_fetch_provider(pool: sqlx::PgPool) {
    let body = serde_json::json!({
        "name": "New Wiring Co",
        "phone": "+919000000001",
        "category": "electrician",
        "hourly_rate": 650.0,
        "latitude": 17.4,
        "longitude": 78.5
    });
    let (status, json) = send(
        app(pool.clone(), TransitionPolicy::Permissive),
        json_request(Method::POST, "/api/v1/providers", &body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = json["data"]["id"].as_str().expect("id").to_string();
    assert_eq!(json["data"]["review_count"], 0);

    let (status, json) = send(
        app(pool.clone(), TransitionPolicy::Permissive),
        get_request(&format!("/api/v1/providers/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "New Wiring Co");

    let (status, json) = send(
        app(pool, TransitionPolicy::Permissive),
        json_request(Method::POST, "/api/v1/providers", &body),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "conflict");
}

#[sqlx::test(migrations = "../../migrations")]
async fn unknown_and_malformed_provider_ids(pool: sqlx::PgPool) {
    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(
        app(pool.clone(), TransitionPolicy::Permissive),
        get_request(&format!("/api/v1/providers/{missing}")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        app(pool, TransitionPolicy::Permissive),
        get_request("/api/v1/providers/not-a-uuid"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn review_submission_updates_provider_rating(pool: sqlx::PgPool) {
    let provider = nearserve_db::insert_provider(
        &pool,
        &nearserve_core::NewProvider {
            name: "Fresh Plumber".to_string(),
            phone: "+919000000002".to_string(),
            category: nearserve_core::Category::Plumber,
            bio: None,
            hourly_rate: 300.0,
            latitude: 17.39,
            longitude: 78.49,
        },
    )
    .await
    .expect("insert provider");
    let uri = format!("/api/v1/providers/{}/reviews", provider.id);

    for (user, rating) in [("u1", 5), ("u2", 4), ("u3", 3)] {
        let body = serde_json::json!({ "user_id": user, "rating": rating, "comment": "ok" });
        let (status, _) = send(
            app(pool.clone(), TransitionPolicy::Permissive),
            json_request(Method::POST, &uri, &body),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, json) = send(
        app(pool.clone(), TransitionPolicy::Permissive),
        get_request(&format!("/api/v1/providers/{}", provider.id)),
    )
    .await;
    assert_eq!(json["data"]["rating"].as_f64(), Some(4.0));
    assert_eq!(json["data"]["review_count"], 3);

    let (status, json) = send(
        app(pool.clone(), TransitionPolicy::Permissive),
        get_request(&uri),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 3);

    let (status, json) = send(
        app(pool, TransitionPolicy::Permissive),
        get_request("/api/v1/users/u1/reviews"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["user_name"], "Anonymous");
}

#[sqlx::test(migrations = "../../migrations")]
async fn review_without_rating_is_rejected(pool: sqlx::PgPool) {
    seed(&pool).await;
    let provider_id = first_provider_id(&pool).await;

    let body = serde_json::json!({ "user_id": "u1", "rating": 0 });
    let (status, json) = send(
        app(pool, TransitionPolicy::Permissive),
        json_request(
            Method::POST,
            &format!("/api/v1/providers/{provider_id}/reviews"),
            &body,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

async fn create_test_booking(pool: &sqlx::PgPool) -> String {
    seed(pool).await;
    let provider_id = first_provider_id(pool).await;
    let body = serde_json::json!({
        "user_id": "user-9",
        "provider_id": provider_id,
        "user_location": { "latitude": 17.385, "longitude": 78.4867 }
    });
    let (status, json) = send(
        app(pool.clone(), TransitionPolicy::Permissive),
        json_request(Method::POST, "/api/v1/bookings", &body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["status"], "requested");
    json["data"]["id"].as_str().expect("booking id").to_string()
}

#[sqlx::test(migrations = "../../migrations")]
async fn guarded_server_rejects_skipping_states(pool: sqlx::PgPool) {
    let id = create_test_booking(&pool).await;

    let (status, json) = send(
        app(pool.clone(), TransitionPolicy::Guarded),
        json_request(
            Method::PATCH,
            &format!("/api/v1/bookings/{id}/status"),
            &serde_json::json!({ "status": "completed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "conflict");

    let (status, json) = send(
        app(pool, TransitionPolicy::Guarded),
        json_request(
            Method::PATCH,
            &format!("/api/v1/bookings/{id}/status"),
            &serde_json::json!({ "status": "accepted" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "accepted");
}

#[sqlx::test(migrations = "../../migrations")]
async fn permissive_server_completes_and_stamps(pool: sqlx::PgPool) {
    let id = create_test_booking(&pool).await;

    let (status, json) = send(
        app(pool.clone(), TransitionPolicy::Permissive),
        json_request(
            Method::PATCH,
            &format!("/api/v1/bookings/{id}/status"),
            &serde_json::json!({ "status": "completed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["completed_at"].is_string());

    let (status, _) = send(
        app(pool, TransitionPolicy::Permissive),
        json_request(
            Method::PATCH,
            &format!("/api/v1/bookings/{id}/status"),
            &serde_json::json!({ "status": "on_hold" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn booking_location_and_user_listing(pool: sqlx::PgPool) {
    let id = create_test_booking(&pool).await;

    let (status, json) = send(
        app(pool.clone(), TransitionPolicy::Permissive),
        json_request(
            Method::PATCH,
            &format!("/api/v1/bookings/{id}/location"),
            &serde_json::json!({ "latitude": 17.39, "longitude": 78.49 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user_latitude"].as_f64(), Some(17.39));
    assert_eq!(json["data"]["user_longitude"].as_f64(), Some(78.49));
    assert!(json["data"]["provider_latitude"].is_null());

    let (status, json) = send(
        app(pool.clone(), TransitionPolicy::Permissive),
        json_request(
            Method::PATCH,
            &format!("/api/v1/bookings/{id}/provider-location"),
            &serde_json::json!({ "latitude": 17.4, "longitude": 78.5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["provider_latitude"].as_f64(), Some(17.4));
    assert_eq!(json["data"]["user_latitude"].as_f64(), Some(17.39));

    let (status, json) = send(
        app(pool, TransitionPolicy::Permissive),
        get_request("/api/v1/users/user-9/bookings"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["id"], id.as_str());
}

#[sqlx::test(migrations = "../../migrations")]
async fn booking_events_for_missing_booking_is_not_found(pool: sqlx::PgPool) {
    let missing = uuid::Uuid::new_v4();
    let (status, json) = send(
        app(pool, TransitionPolicy::Permissive),
        get_request(&format!("/api/v1/bookings/{missing}/events")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn protected_routes_require_bearer_when_keys_configured(pool: sqlx::PgPool) {
    let auth = AuthState::from_keys("secret-key", false).expect("auth");
    let router = build_app(
        AppState {
            pool,
            config: test_config(TransitionPolicy::Permissive),
        },
        auth,
        default_rate_limit_state(),
    );

    let (status, json) = send(router.clone(), get_request("/api/v1/providers")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");

    let request = Request::builder()
        .uri("/api/v1/providers")
        .header(header::AUTHORIZATION, "Bearer secret-key")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(router.clone(), request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(router, get_request("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
}
