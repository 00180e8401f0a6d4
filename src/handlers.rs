//! HTTP endpoints of the gateway.
//!
//! - `GET /agent/run` — the payment-gated price-feed resource. Drives the
//!   request through the [`PaymentGate`] and maps its outcome to the x402
//!   wire shapes: a 402 challenge, a 402 rejection, or a 200 grant carrying
//!   both the resource payload and the settlement receipt.
//! - `POST /agent/chat` — companion conversational proxy, not payment-gated.
//! - `GET /health` — liveness probe.
//!
//! CORS and request tracing are middleware concerns layered on in `main`,
//! not here.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::agent::AgentClient;
use crate::gate::{GateOutcome, HandlerError, PaymentGate, Rejection};
use crate::trust::TrustPath;
use crate::types::PaymentProof;

/// Header carrying a signed payment authorization.
const PAYMENT_HEADER: &str = "x-payment";
/// Legacy header carrying a bare transaction hash for the ledger trust path.
const PAYMENT_TX_HEADER: &str = "x-payment-tx";

/// Read-only per-process state shared by all requests.
pub struct AppState<P> {
    pub gate: PaymentGate<P>,
    pub agent: AgentClient,
}

/// Builds the gateway router over the given state.
pub fn routes<P>(state: Arc<AppState<P>>) -> Router
where
    P: TrustPath + Clone + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/agent/run", get(run_agent::<P>))
        .route("/agent/chat", post(chat_agent::<P>))
        .with_state(state)
}

/// `GET /health`: liveness probe.
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct RunQuery {
    symbols: Option<String>,
}

/// `GET /agent/run`: the protected price-feed resource.
#[tracing::instrument(skip_all)]
async fn run_agent<P>(
    State(state): State<Arc<AppState<P>>>,
    Query(query): Query<RunQuery>,
    headers: HeaderMap,
) -> Response
where
    P: TrustPath + Clone + 'static,
{
    let proof = payment_proof(&headers);
    let coins = AgentClient::coins_from_query(query.symbols.as_deref());
    let agent = state.agent.clone();

    let outcome = state
        .gate
        .handle(proof, move |_grant| async move {
            agent
                .prices(&coins)
                .await
                .map_err(|err| HandlerError::new(err.to_string()))
        })
        .await;

    gate_response(outcome)
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: Option<String>,
}

/// `POST /agent/chat`: conversational proxy. Not payment-gated.
#[tracing::instrument(skip_all)]
async fn chat_agent<P>(
    State(state): State<Arc<AppState<P>>>,
    Json(body): Json<ChatRequest>,
) -> Response
where
    P: TrustPath + Clone + 'static,
{
    let Some(message) = body.message.filter(|m| !m.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Message is required" })),
        )
            .into_response();
    };

    match state.agent.chat(&message).await {
        Ok(reply) => (StatusCode::OK, Json(json!({ "response": reply }))).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "agent_chat_failed",
                "message": err.to_string(),
            })),
        )
            .into_response(),
    }
}

/// Extracts the payment proof from the request headers.
///
/// `X-Payment` carries a signed authorization; `X-Payment-Tx` is accepted as
/// a fallback for clients on the ledger trust path that submit a bare
/// transaction hash.
fn payment_proof(headers: &HeaderMap) -> Option<PaymentProof> {
    [PAYMENT_HEADER, PAYMENT_TX_HEADER]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(PaymentProof::new)
}

/// Maps a gate outcome to its wire response.
fn gate_response(outcome: GateOutcome) -> Response {
    match outcome {
        GateOutcome::Unpaid { requirements } => (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "error": "Payment Required",
                "x402Version": 1,
                "paymentRequirements": requirements,
            })),
        )
            .into_response(),
        GateOutcome::Rejected(Rejection::InvalidProof { reason }) => (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "error": "Invalid payment",
                "invalidReason": reason,
            })),
        )
            .into_response(),
        GateOutcome::Rejected(Rejection::SettlementFailed { reason }) => (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "error": "Payment settlement failed",
                "reason": reason,
            })),
        )
            .into_response(),
        GateOutcome::Granted { data, payment } => (
            StatusCode::OK,
            Json(json!({
                "data": data,
                "payment": payment,
            })),
        )
            .into_response(),
    }
}
