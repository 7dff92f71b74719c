mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use crm_service::models::Invoice;
use crm_service::startup::router;
use reqwest::Client;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

// =============================================================================
// Probes
// =============================================================================

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "crm-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn metrics_endpoint_serves_text() {
    let app = TestApp::spawn().await;

    let response = router(app.state.clone())
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = TestApp::spawn().await;

    let response = router(app.state.clone())
        .oneshot(
            Request::builder()
                .uri("/invoices")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Live events (SSE)
// =============================================================================

#[tokio::test]
async fn live_listener_receives_sweep_push() {
    let app = TestApp::spawn().await;
    let invoice = seed_invoice(
        &app.store,
        Invoice::new(Uuid::new_v4(), invoice_draft("Asha Rao", due_instant())),
    )
    .await;

    let mut response = Client::new()
        .get(format!("{}/events", app.address))
        .send()
        .await
        .expect("Failed to open event stream");
    assert!(response.status().is_success());
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );

    // Subscription is registered once the handler has run
    for _ in 0..50 {
        if app.state.live.listener_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let dispatched = app.state.sweeper.sweep(sweep_now()).await;
    assert_eq!(dispatched.len(), 1);

    let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
        .await
        .expect("Timed out waiting for live event")
        .expect("Failed to read event stream")
        .expect("Event stream ended");
    let text = String::from_utf8_lossy(&chunk);

    assert!(text.contains("event: invoice-reminder"));
    assert!(text.contains(&invoice.invoice_id.to_string()));
    assert!(text.contains("\"displayName\":\"Asha Rao\""));
    assert!(text.contains("\"dueDate\":\"2024-06-09\""));
    assert_eq!(app.state.live.events_emitted(), 1);
}
