use axum::Router;
use axum::http::{HeaderValue, Method, header};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use x402_gateway::agent::AgentClient;
use x402_gateway::config::{Config, TrustPathKind};
use x402_gateway::facilitator_client::FacilitatorClient;
use x402_gateway::gate::PaymentGate;
use x402_gateway::handlers::{self, AppState};
use x402_gateway::ledger::{JsonRpcLedger, LedgerReceiptVerifier, LedgerTrustPath};
use x402_gateway::sig_down;
use x402_gateway::trust::TrustPath;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let config = Config::parse();
    let network = config.network();
    let service = config.service();
    tracing::info!(
        %network,
        service_id = %service.service_id(),
        trust_path = ?config.trust_path,
        "Starting x402 gateway"
    );

    let agent = AgentClient::new(
        &config.price_api_url,
        &config.openai_api_url,
        config.openai_api_key.clone(),
        config.http_timeout(),
    )?;

    let app = match config.trust_path {
        TrustPathKind::Facilitator => {
            let facilitator =
                FacilitatorClient::from_base_url(&config.facilitator_url, config.http_timeout())?;
            gateway_router(&config, facilitator, agent)
        }
        TrustPathKind::Ledger => {
            let contract = config
                .payment_contract
                .ok_or("PAYMENT_CONTRACT is required when TRUST_PATH=ledger")?;
            let ledger = JsonRpcLedger::new(config.rpc_url.clone(), config.http_timeout());
            let verifier = LedgerReceiptVerifier::new(ledger, contract.0);
            let trust = LedgerTrustPath::new(verifier, service.service_id(), network);
            gateway_router(&config, trust, agent)
        }
    };
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config));

    let addr = SocketAddr::from((config.host, config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    let shutdown = sig_down::shutdown_token()?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

fn gateway_router<P>(config: &Config, trust: P, agent: AgentClient) -> Router
where
    P: TrustPath + Clone + 'static,
{
    let gate = PaymentGate::new(trust, config.service(), config.network(), config.seller_wallet);
    handlers::routes(Arc::new(AppState { gate, agent }))
}

/// Restricts CORS to the configured frontend origin, or allows any origin
/// when none is configured.
fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-payment"),
            header::HeaderName::from_static("x-payment-tx"),
        ]);
    match config
        .frontend_url
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin).ok())
    {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(cors::Any),
    }
}
