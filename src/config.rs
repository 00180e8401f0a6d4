//! Process configuration, sourced from the environment.

use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::time::Duration;
use url::Url;

use crate::network::Network;
use crate::requirements::ServiceConfig;
use crate::types::{EvmAddress, TokenAmount};

/// Which trust path confirms payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrustPathKind {
    /// Delegate verification and settlement to a remote x402 facilitator.
    Facilitator,
    /// Confirm settlement directly against on-chain transaction receipts.
    Ledger,
}

#[derive(Debug, Parser)]
#[command(name = "x402-gateway", about = "x402 payment-gated agent gateway")]
pub struct Config {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to bind the HTTP listener to.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Network selection: "cronos" for mainnet, anything else is testnet.
    #[arg(long, env = "NETWORK", default_value = "cronos-testnet")]
    network: String,

    /// Base URL of the x402 facilitator.
    #[arg(
        long,
        env = "FACILITATOR_URL",
        default_value = "https://facilitator.cronoslabs.org/v2/x402"
    )]
    pub facilitator_url: String,

    /// Address that receives settled payments.
    #[arg(long, env = "SELLER_WALLET")]
    pub seller_wallet: EvmAddress,

    /// Price of one resource access, in base units of the payment asset.
    #[arg(long, env = "SERVICE_PRICE", default_value = "1000000")]
    pub service_price: TokenAmount,

    /// JSON-RPC endpoint for the ledger trust path.
    #[arg(long, env = "RPC_URL", default_value = "https://evm.cronos.org")]
    pub rpc_url: Url,

    /// Payment contract whose settlement events the ledger trust path scans.
    /// Required when `TRUST_PATH=ledger`.
    #[arg(long, env = "PAYMENT_CONTRACT")]
    pub payment_contract: Option<EvmAddress>,

    /// Which trust path confirms payments.
    #[arg(long, env = "TRUST_PATH", value_enum, default_value = "facilitator")]
    pub trust_path: TrustPathKind,

    /// Timeout for outbound HTTP and RPC calls, in seconds.
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Base URL of the price-feed upstream.
    #[arg(
        long,
        env = "PRICE_API_URL",
        default_value = "https://api.coingecko.com/api/v3"
    )]
    pub price_api_url: String,

    /// Base URL of the chat-completions upstream.
    #[arg(long, env = "OPENAI_API_URL", default_value = "https://api.openai.com/v1")]
    pub openai_api_url: String,

    /// API key for the chat-completions upstream. Chat returns an error when
    /// unset; the price feed is unaffected.
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Frontend origin allowed by CORS. Any origin is allowed when unset.
    #[arg(long, env = "FRONTEND_URL")]
    pub frontend_url: Option<String>,
}

impl Config {
    pub fn network(&self) -> Network {
        Network::from_selection(&self.network)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// The service this gateway sells access to.
    pub fn service(&self) -> ServiceConfig {
        ServiceConfig::price_feed(self.service_price.clone())
    }
}
