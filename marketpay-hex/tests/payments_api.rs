//! HTTP-level integration tests for the payment API.
//!
//! These exercise the middleware stack (auth, rate limiting) and the
//! always-acknowledge webhook contract end to end.
//!
//! This test requires the `sqlite` feature flag.

#![cfg(feature = "sqlite")]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use marketpay_gateway::{GatewayConfig, SatimGateway, signature};
use marketpay_hex::{PaymentService, inbound::HttpServer};
use marketpay_repo::SqliteRepo;
use marketpay_types::{
    Amount, GatewayWebhookPayload, NewOrder, Order, OrderRepository, PaymentMode, UserId,
};

type TestServer = HttpServer<SqliteRepo, SatimGateway>;

/// Builds a server over in-memory SQLite and the simulated gateway,
/// with one seeded order awaiting payment.
async fn create_test_server(requests_per_minute: u32) -> (TestServer, Order) {
    let repo = SqliteRepo::new("sqlite::memory:").await.unwrap();
    let order = repo
        .insert_order(NewOrder {
            user_id: UserId::new(),
            provider_id: None,
            total: Amount::from_dinars(1200).unwrap(),
            payment_mode: PaymentMode::Cib,
        })
        .await
        .unwrap();
    repo.store_transaction_id(order.id, "txn_hook").await.unwrap();

    let gateway = SatimGateway::new(GatewayConfig::simulated_for_tests(5));
    let service = PaymentService::new(repo, gateway);
    (HttpServer::with_rate_limit(service, requests_per_minute), order)
}

fn health_request() -> Request<Body> {
    Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap()
}

fn bootstrap_request() -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/bootstrap")
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"name": "test-key"}"#))
        .unwrap()
}

fn methods_request(api_key: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/payments/methods")
        .header("Authorization", format!("Bearer {}", api_key))
        .body(Body::empty())
        .unwrap()
}

fn webhook_request(payload: &GatewayWebhookPayload) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook/gateway")
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

fn signed_webhook(order: &Order, action_code: &str) -> GatewayWebhookPayload {
    let mut payload = GatewayWebhookPayload {
        transaction_id: Some("txn_hook".to_string()),
        order_number: Some(order.order_number.clone()),
        amount: order.total,
        status: None,
        action_code: action_code.to_string(),
        signature: String::new(),
    };
    payload.signature = signature::sign_fields(&payload.signature_fields(), "simulated_secret");
    payload
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn bootstrap_api_key(app: axum::Router) -> String {
    let response = app.oneshot(bootstrap_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    json["api_key"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_payments_require_api_key() {
    let (server, _) = create_test_server(100).await;
    let app = server.router();

    let response = app.clone().oneshot(methods_request("sk_bogus")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let api_key = bootstrap_api_key(app.clone()).await;
    let response = app.clone().oneshot(methods_request(&api_key)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let ids: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["cib", "edahabia", "cash"]);
}

#[tokio::test]
async fn test_webhook_bypasses_auth_and_is_processed() {
    let (server, order) = create_test_server(100).await;
    let app = server.router();

    // No Authorization header on purpose.
    let response = app
        .clone()
        .oneshot(webhook_request(&signed_webhook(&order, "00")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["processed"], true);
    assert_eq!(json["order_id"], serde_json::json!(order.id));
}

#[tokio::test]
async fn test_webhook_redelivery_still_acknowledged() {
    let (server, order) = create_test_server(100).await;
    let app = server.router();
    let payload = signed_webhook(&order, "00");

    let first = app.clone().oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let json = json_body(second).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["processed"], true);
}

#[tokio::test]
async fn test_webhook_bad_signature_acknowledged_not_processed() {
    let (server, order) = create_test_server(100).await;
    let app = server.router();

    let mut payload = signed_webhook(&order, "00");
    payload.signature = "forged".to_string();

    let response = app.clone().oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["processed"], false);
}

#[tokio::test]
async fn test_rate_limiting_returns_429_when_exceeded() {
    // Only 3 requests allowed per minute per key.
    let (server, _) = create_test_server(3).await;
    let app = server.router();

    // Bootstrap uses the "anonymous" quota, not the new key's.
    let api_key = bootstrap_api_key(app.clone()).await;

    for i in 1..=3 {
        let response = app.clone().oneshot(methods_request(&api_key)).await.unwrap();
        assert_ne!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS,
            "Request {} should not be rate limited (quota not yet exceeded)",
            i
        );
    }

    let response = app.clone().oneshot(methods_request(&api_key)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("Rate limit exceeded"));
    assert_eq!(json["retry_after_seconds"], 60);
}

#[tokio::test]
async fn test_rate_limiting_skips_health_and_webhook() {
    let (server, order) = create_test_server(1).await;
    let app = server.router();

    for _ in 0..5 {
        let response = app.clone().oneshot(health_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Webhook retries must never be throttled into a retry storm.
    let payload = signed_webhook(&order, "00");
    for _ in 0..5 {
        let response = app.clone().oneshot(webhook_request(&payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
