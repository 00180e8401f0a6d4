//! Type definitions for the x402 payment-gate protocol.
//!
//! This mirrors the wire structures exchanged with x402 clients and the
//! remote facilitator: `PaymentRequirements`, `VerifyRequest`/`VerifyResponse`,
//! and `SettleResponse`, plus the typed outcomes the trust paths produce.
//! Wire names are camelCase per the x402 SDKs.

use alloy_primitives::{B256, U256, keccak256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display};
use std::str::FromStr;

use crate::network::Network;
use crate::timestamp::UnixTimestamp;

/// Represents the protocol version. Currently only version 1 is supported.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum X402Version {
    /// Version `1`.
    V1,
}

impl Serialize for X402Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            X402Version::V1 => serializer.serialize_u8(1),
        }
    }
}

impl<'de> Deserialize<'de> for X402Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let num = u8::deserialize(deserializer)?;
        match num {
            1 => Ok(X402Version::V1),
            other => Err(serde::de::Error::custom(format!(
                "Unsupported x402Version: {other}"
            ))),
        }
    }
}

impl Display for X402Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            X402Version::V1 => write!(f, "1"),
        }
    }
}

/// Enumerates payment schemes. Only "exact" is supported: the amount to be
/// transferred must match the required amount exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Exact,
}

impl Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Exact => write!(f, "exact"),
        }
    }
}

/// Represents an EVM address.
///
/// Wrapper around [`alloy_primitives::Address`], providing display and
/// serialization support for typed address handling throughout the protocol.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct EvmAddress(pub alloy_primitives::Address);

impl Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to decode EVM address")]
pub struct EvmAddressDecodingError;

impl FromStr for EvmAddress {
    type Err = EvmAddressDecodingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address =
            alloy_primitives::Address::from_str(s).map_err(|_| EvmAddressDecodingError)?;
        Ok(Self(address))
    }
}

impl From<alloy_primitives::Address> for EvmAddress {
    fn from(address: alloy_primitives::Address) -> Self {
        EvmAddress(address)
    }
}

impl From<EvmAddress> for alloy_primitives::Address {
    fn from(address: EvmAddress) -> Self {
        address.0
    }
}

/// Token amount in the smallest unit of the asset, e.g. `1000000` for
/// 1 USDC.e at 6 decimals.
///
/// Serialized as a decimal string to avoid precision loss in JSON.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenAmount(pub U256);

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let amount = U256::from_str_radix(&s, 10)
            .map_err(|_| serde::de::Error::custom("amount must be a decimal integer string"))?;
        Ok(TokenAmount(amount))
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        TokenAmount(U256::from(value))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to parse token amount")]
pub struct TokenAmountDecodingError;

impl FromStr for TokenAmount {
    type Err = TokenAmountDecodingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = U256::from_str_radix(s, 10).map_err(|_| TokenAmountDecodingError)?;
        Ok(TokenAmount(amount))
    }
}

/// A fixed-length content-derived identifier naming the metered service.
///
/// Computed as keccak-256 of the service seed string, and compared byte-wise,
/// so hex-case differences on the wire cannot cause a mismatch between the
/// requirements issued and the settlement event observed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId(pub B256);

impl ServiceId {
    /// Derives the identifier from a service seed string.
    pub fn derive(seed: &str) -> Self {
        ServiceId(keccak256(seed.as_bytes()))
    }
}

impl Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Service id must be a 0x-prefixed 32-byte hex string")]
pub struct ServiceIdDecodingError;

impl FromStr for ServiceId {
    type Err = ServiceIdDecodingError;

    /// Parses a 0x-prefixed hex string of either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_str = s.strip_prefix("0x").ok_or(ServiceIdDecodingError)?;
        let bytes = hex::decode(hex_str).map_err(|_| ServiceIdDecodingError)?;
        let array: [u8; 32] = bytes.try_into().map_err(|_| ServiceIdDecodingError)?;
        Ok(ServiceId(B256::from(array)))
    }
}

impl Serialize for ServiceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ServiceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ServiceId::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Opaque client-supplied evidence of payment.
///
/// Either a signed payment authorization (the `X-Payment` token) or a bare
/// transaction hash, depending on the trust path. The gate never interprets
/// its internal structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof(String);

impl PaymentProof {
    pub fn new(value: impl Into<String>) -> Self {
        PaymentProof(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PaymentProof {
    fn from(value: &str) -> Self {
        PaymentProof(value.to_string())
    }
}

/// Describes what payment satisfies access to one resource.
///
/// Immutable once issued for a given request, and derived deterministically
/// from service configuration and the active network: two requests against
/// the same service and network always produce identical requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme. Always [`Scheme::Exact`].
    pub scheme: Scheme,
    /// The network the payment must settle on.
    pub network: Network,
    /// The recipient address for payment.
    pub pay_to: EvmAddress,
    /// The token asset contract address.
    pub asset: EvmAddress,
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource.
    pub mime_type: String,
    /// The maximum amount required for payment, in the smallest token unit.
    pub max_amount_required: TokenAmount,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
}

/// Body of `POST /verify` and `POST /settle` requests to the facilitator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub x402_version: X402Version,
    /// The opaque payment proof supplied by the client.
    pub payment_header: PaymentProof,
    pub payment_requirements: PaymentRequirements,
}

/// Body of `POST /settle` requests. The settle body is wire-identical to the
/// verify body; the distinct name keeps call sites honest about which
/// endpoint they address.
pub type SettleRequest = VerifyRequest;

/// Facilitator response to `POST /verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

/// Settlement lifecycle event reported by the facilitator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleEvent {
    #[serde(rename = "payment.settled")]
    Settled,
    #[serde(rename = "payment.failed")]
    Failed,
}

/// Facilitator response to `POST /settle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub event: SettleEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<EvmAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<EvmAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<TokenAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of payment verification, produced by either trust path.
///
/// Every failure mode of the underlying call, including transport errors and
/// malformed responses, is normalized into [`VerificationOutcome::Invalid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Valid,
    Invalid { reason: String },
}

impl VerificationOutcome {
    pub fn invalid(reason: impl Into<String>) -> Self {
        VerificationOutcome::Invalid {
            reason: reason.into(),
        }
    }
}

/// On-chain settlement details echoed back to the client as a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<EvmAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<EvmAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<TokenAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Result of payment settlement, produced by either trust path.
///
/// Like verification, settlement is fail-closed: any error path yields
/// [`SettlementOutcome::Failed`] with the time of failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled(SettlementReceipt),
    Failed {
        reason: String,
        timestamp: UnixTimestamp,
    },
}

impl SettlementOutcome {
    /// Records a settlement failure at the current time.
    pub fn failed_now(reason: impl Into<String>) -> Self {
        SettlementOutcome::Failed {
            reason: reason.into(),
            timestamp: UnixTimestamp::now(),
        }
    }
}

impl From<SettleResponse> for SettlementOutcome {
    fn from(response: SettleResponse) -> Self {
        match response.event {
            SettleEvent::Settled => SettlementOutcome::Settled(SettlementReceipt {
                tx_hash: response.tx_hash,
                from: response.from,
                to: response.to,
                value: response.value,
                block_number: response.block_number,
                network: response.network,
                timestamp: response.timestamp,
            }),
            SettleEvent::Failed => SettlementOutcome::failed_now(
                response
                    .error
                    .unwrap_or_else(|| "Settlement failed".to_string()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_id_matches_keccak_of_seed() {
        let id = ServiceId::derive("ai-agent-access-v1");
        assert_eq!(id.0, keccak256("ai-agent-access-v1".as_bytes()));
    }

    #[test]
    fn service_id_parses_either_hex_case() {
        let id = ServiceId::derive("price-feed-v1");
        let lower = id.to_string();
        let upper = format!("0x{}", lower.trim_start_matches("0x").to_uppercase());
        assert_eq!(ServiceId::from_str(&lower).unwrap(), id);
        assert_eq!(ServiceId::from_str(&upper).unwrap(), id);
    }

    #[test]
    fn verify_request_wire_shape() {
        let requirements = PaymentRequirements {
            scheme: Scheme::Exact,
            network: Network::CronosTestnet,
            pay_to: "0x1111111111111111111111111111111111111111".parse().unwrap(),
            asset: Network::CronosTestnet.usdc_asset().into(),
            description: "Premium crypto price feed API access".to_string(),
            mime_type: "application/json".to_string(),
            max_amount_required: TokenAmount::from(1_000_000u64),
            max_timeout_seconds: 300,
        };
        let request = VerifyRequest {
            x402_version: X402Version::V1,
            payment_header: PaymentProof::new("opaque-token"),
            payment_requirements: requirements,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["x402Version"], json!(1));
        assert_eq!(value["paymentHeader"], json!("opaque-token"));
        assert_eq!(value["paymentRequirements"]["scheme"], json!("exact"));
        assert_eq!(
            value["paymentRequirements"]["network"],
            json!("cronos-testnet")
        );
        assert_eq!(
            value["paymentRequirements"]["maxAmountRequired"],
            json!("1000000")
        );
        assert_eq!(value["paymentRequirements"]["maxTimeoutSeconds"], json!(300));
    }

    #[test]
    fn settle_response_settled_becomes_receipt() {
        let response: SettleResponse = serde_json::from_value(json!({
            "event": "payment.settled",
            "txHash": "0xabc",
            "from": "0x2222222222222222222222222222222222222222",
            "to": "0x3333333333333333333333333333333333333333",
            "value": "1000000",
            "blockNumber": 1234,
            "network": "cronos-testnet",
            "timestamp": "2024-05-01T00:00:00Z"
        }))
        .unwrap();
        match SettlementOutcome::from(response) {
            SettlementOutcome::Settled(receipt) => {
                assert_eq!(receipt.tx_hash.as_deref(), Some("0xabc"));
                assert_eq!(receipt.block_number, Some(1234));
                assert_eq!(receipt.value, Some(TokenAmount::from(1_000_000u64)));
            }
            SettlementOutcome::Failed { .. } => panic!("expected settled"),
        }
    }

    #[test]
    fn settle_response_failed_carries_reason() {
        let response: SettleResponse = serde_json::from_value(json!({
            "event": "payment.failed",
            "error": "insufficient allowance"
        }))
        .unwrap();
        match SettlementOutcome::from(response) {
            SettlementOutcome::Failed { reason, .. } => {
                assert_eq!(reason, "insufficient allowance");
            }
            SettlementOutcome::Settled(_) => panic!("expected failed"),
        }
    }
}
