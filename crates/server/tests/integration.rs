//! Integration tests for the delivery server routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server.
//!
//! ```bash
//! cargo test -p notify-server --test integration
//! ```

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use tower::ServiceExt;

use notify_common::config::AppConfig;
use notify_server::routes::create_router;
use notify_server::state::AppState;

// ============================================================
// Helpers
// ============================================================

/// Create a test AppConfig with a specific failure rate.
fn test_config(delivery_failure_rate: f64) -> AppConfig {
    AppConfig {
        delivery_failure_rate,
        ..AppConfig::default()
    }
}

async fn get(path: &str, failure_rate: f64) -> axum::response::Response {
    create_router(AppState::new(test_config(failure_rate)))
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

// ============================================================
// Delivery routes
// ============================================================

#[tokio::test]
async fn test_email_succeeds_without_failures() {
    let response = get("/email", 0.0).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_push_succeeds_without_failures() {
    let response = get("/push", 0.0).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_email_fails_when_always_failing() {
    let response = get("/email", 1.0).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_push_fails_when_always_failing() {
    let response = get("/push", 1.0).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_traced_request_is_accepted() {
    notify_common::telemetry::init_propagator();

    let request = Request::builder()
        .uri("/email")
        .header(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        )
        .body(Body::empty())
        .unwrap();

    let response = create_router(AppState::new(test_config(0.0)))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_post_is_not_allowed() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/email")
        .body(Body::empty())
        .unwrap();

    let response = create_router(AppState::new(test_config(0.0)))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = get("/sms", 0.0).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================
// Health
// ============================================================

#[tokio::test]
async fn test_health_reports_ok() {
    let response = get("/health", 0.0).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "notification-server");
}
