//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, NaiveDate, Utc};
use common::{CourseId, ProductId, SessionId, TripId, UserId};
use domain::CancellationPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CourseSession, InMemoryStore, Trip};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestCatalog {
    app: axum::Router,
    store: InMemoryStore,
    product_id: ProductId,
    session_id: SessionId,
    full_session_id: SessionId,
    trip_id: TripId,
}

async fn setup() -> TestCatalog {
    let store = InMemoryStore::new();
    let product_id = ProductId::new();
    store.set_stock(product_id, 5).await;

    let session_id = SessionId::new();
    store
        .add_session(CourseSession {
            id: session_id,
            course_id: CourseId::new(),
            starts_at: Utc::now() + Duration::days(3),
            capacity: 8,
        })
        .await;
    let full_session_id = SessionId::new();
    store
        .add_session(CourseSession {
            id: full_session_id,
            course_id: CourseId::new(),
            starts_at: Utc::now() + Duration::days(3),
            capacity: 0,
        })
        .await;

    let trip_id = TripId::new();
    store
        .add_trip(Trip {
            id: trip_id,
            title: "Shark point".to_string(),
            seats_total: 1,
            starts_on: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            ends_on: NaiveDate::from_ymd_opt(2026, 12, 2).unwrap(),
            active: true,
        })
        .await;

    let state = Arc::new(api::AppState::new(
        store.clone(),
        CancellationPolicy::default(),
    ));
    let app = api::create_app(state, get_metrics_handle());

    TestCatalog {
        app,
        store,
        product_id,
        session_id,
        full_session_id,
        trip_id,
    }
}

fn post_json(uri: &str, user_id: Option<UserId>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user_id) = user_id {
        builder = builder.header("x-user-id", user_id.to_string());
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let catalog = setup().await;

    let (status, json) = send(
        &catalog.app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "ok");
}

#[tokio::test]
async fn test_create_and_get_order() {
    let catalog = setup().await;
    let user_id = UserId::new();

    let (status, json) = send(
        &catalog.app,
        post_json(
            "/orders",
            Some(user_id),
            serde_json::json!({
                "total": 49_000,
                "items": [{
                    "product_id": catalog.product_id,
                    "quantity": 2,
                    "price": 4_500
                }],
                "courses": [{ "session_id": catalog.session_id, "price": 40_000 }],
                "payment_ref": "sim-42"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "pending");
    let order_id = json["order_id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &catalog.app,
        Request::builder()
            .uri(format!("/orders/{order_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["order"]["status"], "pending");
    assert_eq!(json["order"]["total"], 49_000);
    assert_eq!(json["order"]["user_id"], user_id.to_string());
    assert_eq!(json["lines"].as_array().unwrap().len(), 1);
    assert_eq!(json["enrollments"][0]["status"], "enrolled");
    assert_eq!(catalog.store.stock(catalog.product_id).await, Some(3));
}

#[tokio::test]
async fn test_order_against_full_session_is_capacity_conflict() {
    let catalog = setup().await;

    let (status, json) = send(
        &catalog.app,
        post_json(
            "/orders",
            Some(UserId::new()),
            serde_json::json!({
                "total": 10_000,
                "items": [{ "product_id": catalog.product_id, "quantity": 1, "price": 1_000 }],
                "courses": [{ "session_id": catalog.full_session_id, "price": 9_000 }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "capacity_exceeded");
    assert_eq!(catalog.store.order_count().await, 0);
    assert_eq!(catalog.store.stock(catalog.product_id).await, Some(5));
}

#[tokio::test]
async fn test_empty_order_is_bad_request() {
    let catalog = setup().await;

    let (status, json) = send(
        &catalog.app,
        post_json(
            "/orders",
            Some(UserId::new()),
            serde_json::json!({ "total": 1_000 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
}

#[tokio::test]
async fn test_malformed_body_is_validation_error() {
    let catalog = setup().await;

    let (status, json) = send(
        &catalog.app,
        post_json(
            "/orders",
            Some(UserId::new()),
            serde_json::json!({
                "items": [{ "product_id": "x", "quantity": -1, "price": 1 }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
    assert!(json["error"].is_string());

    let uri = format!("/refunds/{}/actions", uuid::Uuid::new_v4());
    let (status, json) = send(
        &catalog.app,
        post_json(&uri, None, serde_json::json!({ "action": "maybe" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");

    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("x-user-id", UserId::new().to_string())
        .body(Body::from("{}"))
        .unwrap();
    let (status, json) = send(&catalog.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
}

#[tokio::test]
async fn test_missing_user_header_is_bad_request() {
    let catalog = setup().await;

    let (status, json) = send(
        &catalog.app,
        post_json(
            "/enrollments",
            None,
            serde_json::json!({ "session_id": catalog.session_id }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "bad_request");
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let catalog = setup().await;

    let (status, json) = send(
        &catalog.app,
        Request::builder()
            .uri(format!("/orders/{}", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");

    let (status, _) = send(
        &catalog.app,
        Request::builder()
            .uri("/orders/not-a-uuid")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_enroll_and_cancel() {
    let catalog = setup().await;
    let user_id = UserId::new();

    let (status, json) = send(
        &catalog.app,
        post_json(
            "/enrollments",
            Some(user_id),
            serde_json::json!({ "session_id": catalog.session_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let enrollment_id = json["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &catalog.app,
        post_json(
            "/enrollments",
            Some(user_id),
            serde_json::json!({ "session_id": catalog.session_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "conflict");

    let cancel_uri = format!("/enrollments/{enrollment_id}/cancel");
    let (status, json) = send(
        &catalog.app,
        post_json(&cancel_uri, Some(UserId::new()), serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["kind"], "authorization");

    let (status, json) = send(
        &catalog.app,
        post_json(&cancel_uri, Some(user_id), serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");
}

#[tokio::test]
async fn test_trip_booking_capacity_and_cancel() {
    let catalog = setup().await;
    let user_id = UserId::new();

    let (status, json) = send(
        &catalog.app,
        post_json(
            "/trip-bookings",
            Some(user_id),
            serde_json::json!({ "trip_id": catalog.trip_id, "paid_cents": 12_000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["paid_amount"], 12_000);
    let booking_id = json["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &catalog.app,
        post_json(
            "/trip-bookings",
            Some(UserId::new()),
            serde_json::json!({ "trip_id": catalog.trip_id, "paid_cents": 12_000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "capacity_exceeded");

    let (status, json) = send(
        &catalog.app,
        post_json(
            &format!("/trip-bookings/{booking_id}/cancel"),
            Some(user_id),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");
    assert_eq!(catalog.store.confirmed_booking_count(catalog.trip_id).await, 0);
}

#[tokio::test]
async fn test_refund_approve_twice_conflicts() {
    let catalog = setup().await;
    let user_id = UserId::new();

    let (_, json) = send(
        &catalog.app,
        post_json(
            "/enrollments",
            Some(user_id),
            serde_json::json!({ "session_id": catalog.session_id }),
        ),
    )
    .await;
    let enrollment_id = json["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &catalog.app,
        post_json(
            "/refunds",
            Some(user_id),
            serde_json::json!({
                "enrollment_id": enrollment_id,
                "amount_cents": 20_000,
                "reason": "moved away"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "pending");
    let actions_uri = format!("/refunds/{}/actions", json["id"].as_str().unwrap());

    let (status, json) = send(
        &catalog.app,
        post_json(&actions_uri, None, serde_json::json!({ "action": "approve" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "approved");

    let (status, json) = send(
        &catalog.app,
        post_json(&actions_uri, None, serde_json::json!({ "action": "approve" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Conflict: refund has already been approved");
}

#[tokio::test]
async fn test_cancel_order_endpoint() {
    let catalog = setup().await;

    let (_, json) = send(
        &catalog.app,
        post_json(
            "/orders",
            Some(UserId::new()),
            serde_json::json!({
                "total": 9_000,
                "items": [{ "product_id": catalog.product_id, "quantity": 2, "price": 4_500 }]
            }),
        ),
    )
    .await;
    let cancel_uri = format!("/orders/{}/cancel", json["order_id"].as_str().unwrap());

    let (status, json) = send(&catalog.app, post_json(&cancel_uri, None, serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");
    assert_eq!(catalog.store.stock(catalog.product_id).await, Some(5));

    let (status, json) = send(&catalog.app, post_json(&cancel_uri, None, serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "conflict");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let catalog = setup().await;

    send(
        &catalog.app,
        post_json(
            "/orders",
            Some(UserId::new()),
            serde_json::json!({
                "total": 4_500,
                "items": [{ "product_id": catalog.product_id, "quantity": 1, "price": 4_500 }]
            }),
        ),
    )
    .await;

    let response = catalog
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}
