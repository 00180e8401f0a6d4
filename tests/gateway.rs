//! End-to-end tests of the gateway HTTP surface against a mock facilitator
//! and mock data upstreams.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use x402_gateway::agent::AgentClient;
use x402_gateway::facilitator_client::FacilitatorClient;
use x402_gateway::gate::PaymentGate;
use x402_gateway::handlers::{AppState, routes};
use x402_gateway::network::Network;
use x402_gateway::requirements::ServiceConfig;
use x402_gateway::types::{EvmAddress, TokenAmount};

const SELLER: &str = "0xA0Cf798816D4b9b9866b5330EEa46a18382f251e";
const TESTNET_USDC: &str = "0xc01efaaf7c5c61bebfaeb358e1161b537b8bc0e0";

async fn gateway(facilitator: &MockServer, upstream: &MockServer) -> Router {
    let trust =
        FacilitatorClient::from_base_url(&facilitator.uri(), Duration::from_secs(5)).unwrap();
    let seller: EvmAddress = SELLER.parse().unwrap();
    let gate = PaymentGate::new(
        trust,
        ServiceConfig::price_feed(TokenAmount::from(1_000_000u64)),
        Network::CronosTestnet,
        seller,
    );
    let agent = AgentClient::new(
        &upstream.uri(),
        &upstream.uri(),
        None,
        Duration::from_secs(5),
    )
    .unwrap();
    routes(Arc::new(AppState { gate, agent }))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn request_without_payment_gets_a_402_challenge() {
    let facilitator = MockServer::start().await;
    let upstream = MockServer::start().await;
    let app = gateway(&facilitator, &upstream).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/agent/run")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("Payment Required"));
    assert_eq!(body["x402Version"], json!(1));
    let requirements = &body["paymentRequirements"];
    assert_eq!(requirements["scheme"], json!("exact"));
    assert_eq!(requirements["network"], json!("cronos-testnet"));
    assert_eq!(requirements["maxAmountRequired"], json!("1000000"));
    assert!(
        requirements["asset"]
            .as_str()
            .unwrap()
            .eq_ignore_ascii_case(TESTNET_USDC)
    );
}

#[tokio::test]
async fn paid_request_returns_data_and_receipt() {
    let facilitator = MockServer::start().await;
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isValid": true })))
        .expect(1)
        .mount(&facilitator)
        .await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "event": "payment.settled",
            "txHash": "0xabc",
            "network": "cronos-testnet",
            "blockNumber": 1234,
        })))
        .expect(1)
        .mount(&facilitator)
        .await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bitcoin": { "usd": 43250.12, "usd_24h_change": 2.1 }
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = gateway(&facilitator, &upstream).await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/agent/run?symbols=bitcoin")
                .header("X-Payment", "signed-payment-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["bitcoin"]["usd"], json!(43250.12));
    assert_eq!(body["payment"]["txHash"], json!("0xabc"));
    assert_eq!(body["payment"]["blockNumber"], json!(1234));
}

#[tokio::test]
async fn invalid_payment_is_rejected_without_settlement() {
    let facilitator = MockServer::start().await;
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isValid": false,
            "invalidReason": "expired",
        })))
        .expect(1)
        .mount(&facilitator)
        .await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&facilitator)
        .await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let app = gateway(&facilitator, &upstream).await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/agent/run")
                .header("X-Payment", "stale-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("Invalid payment"));
    assert_eq!(body["invalidReason"], json!("expired"));
}

#[tokio::test]
async fn failed_settlement_is_rejected_after_valid_verification() {
    let facilitator = MockServer::start().await;
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isValid": true })))
        .expect(1)
        .mount(&facilitator)
        .await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "event": "payment.failed",
            "error": "insufficient allowance",
        })))
        .expect(1)
        .mount(&facilitator)
        .await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let app = gateway(&facilitator, &upstream).await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/agent/run")
                .header("X-Payment", "signed-payment-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("Payment settlement failed"));
    assert_eq!(body["reason"], json!("insufficient allowance"));
}

#[tokio::test]
async fn chat_requires_a_message() {
    let facilitator = MockServer::start().await;
    let upstream = MockServer::start().await;
    let app = gateway(&facilitator, &upstream).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/agent/chat")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"message": "  "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("Message is required"));
}

#[tokio::test]
async fn health_reports_ok() {
    let facilitator = MockServer::start().await;
    let upstream = MockServer::start().await;
    let app = gateway(&facilitator, &upstream).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("ok"));
}
