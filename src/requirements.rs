//! Derivation of canonical payment requirements for the protected service.
//!
//! Requirements are a pure function of static service configuration and the
//! active network selection. The same inputs always produce field-identical
//! output, which matters twice per paid request: the challenge issued on the
//! first pass and the requirements sent to the trust path on the second pass
//! must match exactly.

use crate::network::Network;
use crate::types::{EvmAddress, PaymentRequirements, Scheme, ServiceId, TokenAmount};

/// Static description of the metered service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Human-readable service name.
    pub name: String,
    /// Seed string hashed into the [`ServiceId`].
    pub id_seed: String,
    /// Price in the smallest token unit.
    pub price: TokenAmount,
    /// Description advertised in the 402 challenge.
    pub description: String,
    /// MIME type of the resource payload.
    pub mime_type: String,
    /// Maximum payment validity window in seconds.
    pub max_timeout_seconds: u64,
}

impl ServiceConfig {
    /// The default metered service: the crypto price feed agent.
    pub fn price_feed(price: TokenAmount) -> Self {
        ServiceConfig {
            name: "Crypto Price Feed Agent".to_string(),
            id_seed: "ai-agent-access-v1".to_string(),
            price,
            description: "Premium crypto price feed API access".to_string(),
            mime_type: "application/json".to_string(),
            max_timeout_seconds: 300,
        }
    }

    /// The content-derived identifier of this service.
    ///
    /// Stable for the lifetime of the service; derived per call, since the
    /// hash is cheap and hidden global state is not worth the trouble.
    pub fn service_id(&self) -> ServiceId {
        ServiceId::derive(&self.id_seed)
    }
}

/// Builds the [`PaymentRequirements`] for one resource request.
///
/// Pure and total: there is no failure path. The asset contract is selected
/// from the exhaustive per-network mapping in [`Network::usdc_asset`].
pub fn build(service: &ServiceConfig, network: Network, pay_to: EvmAddress) -> PaymentRequirements {
    PaymentRequirements {
        scheme: Scheme::Exact,
        network,
        pay_to,
        asset: network.usdc_asset().into(),
        description: service.description.clone(),
        mime_type: service.mime_type.clone(),
        max_amount_required: service.price,
        max_timeout_seconds: service.max_timeout_seconds,
    }
}
