//! Direct-ledger trust path: settlement confirmation from transaction
//! receipts.
//!
//! This is the fallback for environments without a facilitator. Trust is
//! re-derived from ledger state rather than a third party, at the cost of
//! requiring the payment proof to already be an on-chain transaction hash
//! instead of a pre-chain signed authorization.
//!
//! The payment smart contract is treated as an opaque ledger entry that emits
//! `PaymentSettled(address payer, bytes32 serviceId, uint256 amount,
//! uint256 timestamp)`. A payment counts as settled when the transaction
//! succeeded and at least one log emitted by the expected contract decodes to
//! that event with the expected service identifier.

use alloy_primitives::{Address, Log, TxHash};
use alloy_provider::{Provider, RootProvider};
use alloy_sol_types::{SolEvent, sol};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::network::Network;
use crate::trust::TrustPath;
use crate::types::{
    PaymentProof, PaymentRequirements, ServiceId, SettlementOutcome, SettlementReceipt,
    VerificationOutcome,
};

sol! {
    /// Settlement event emitted by the payment contract.
    event PaymentSettled(address payer, bytes32 serviceId, uint256 amount, uint256 timestamp);
}

/// Errors raised while querying the ledger.
///
/// These stay inside the trust path; the gate only ever sees outcomes.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger RPC error: {0}")]
    Rpc(String),
    #[error("Ledger query timed out")]
    Timeout,
}

/// The slice of a transaction receipt the verifier needs.
#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    /// Whether the transaction succeeded. Reverted is not settled.
    pub status: bool,
    /// Transaction sender.
    pub from: Address,
    /// Transaction target, normally the payment contract.
    pub to: Option<Address>,
    /// Block the transaction was mined in, if known.
    pub block_number: Option<u64>,
    /// Logs emitted during execution, from all contracts touched.
    pub logs: Vec<Log>,
}

/// Source of transaction receipts, abstracted for testing.
pub trait ReceiptSource: Send + Sync {
    /// Fetches the receipt for a transaction hash.
    ///
    /// Returns `Ok(None)` for an unknown or still-pending transaction.
    fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<LedgerReceipt>, LedgerError>> + Send;
}

impl<T: ReceiptSource> ReceiptSource for std::sync::Arc<T> {
    fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<LedgerReceipt>, LedgerError>> + Send {
        self.as_ref().transaction_receipt(tx_hash)
    }
}

/// A [`ReceiptSource`] backed by an HTTP JSON-RPC node.
#[derive(Debug, Clone)]
pub struct JsonRpcLedger {
    provider: RootProvider,
    timeout: Duration,
}

impl JsonRpcLedger {
    pub fn new(rpc_url: Url, timeout: Duration) -> Self {
        Self {
            provider: RootProvider::new_http(rpc_url),
            timeout,
        }
    }
}

impl ReceiptSource for JsonRpcLedger {
    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        let fetch = self.provider.get_transaction_receipt(tx_hash);
        let receipt = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| LedgerError::Timeout)?
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        Ok(receipt.map(|receipt| LedgerReceipt {
            status: receipt.status(),
            from: receipt.from,
            to: receipt.to,
            block_number: receipt.block_number,
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        }))
    }
}

/// Verifies that a transaction settled a payment for a given service.
#[derive(Debug, Clone)]
pub struct LedgerReceiptVerifier<S> {
    source: S,
    /// The payment contract whose logs are trusted.
    contract: Address,
}

impl<S: ReceiptSource> LedgerReceiptVerifier<S> {
    pub fn new(source: S, contract: Address) -> Self {
        Self { source, contract }
    }

    /// Returns whether `tx_hash` carries a matching settlement event.
    ///
    /// False for a missing or pending receipt, a reverted transaction, logs
    /// from other contracts only, or no decodable `PaymentSettled` log with
    /// the expected service identifier.
    pub async fn verify_settled(&self, tx_hash: TxHash, service_id: &ServiceId) -> bool {
        self.find_settled(tx_hash, service_id).await.is_some()
    }

    /// Fetches the receipt and scans it for the first matching settlement
    /// event, returning both for receipt echoing.
    pub async fn find_settled(
        &self,
        tx_hash: TxHash,
        service_id: &ServiceId,
    ) -> Option<(LedgerReceipt, PaymentSettled)> {
        let receipt = match self.source.transaction_receipt(tx_hash).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => {
                tracing::debug!(tx = %tx_hash, "No receipt on ledger");
                return None;
            }
            Err(err) => {
                tracing::warn!(tx = %tx_hash, error = %err, "Receipt fetch failed");
                return None;
            }
        };
        if !receipt.status {
            tracing::debug!(tx = %tx_hash, "Transaction reverted");
            return None;
        }
        let event = self.scan_logs(&receipt, service_id)?;
        Some((receipt, event))
    }

    /// First log from the payment contract that decodes to [`PaymentSettled`]
    /// with the expected service identifier. Logs from other contracts and
    /// logs of other event types are skipped.
    fn scan_logs(&self, receipt: &LedgerReceipt, service_id: &ServiceId) -> Option<PaymentSettled> {
        for log in &receipt.logs {
            if log.address != self.contract {
                continue;
            }
            let Ok(event) = PaymentSettled::decode_log_data(&log.data) else {
                // The contract may emit other event types.
                continue;
            };
            if event.serviceId == service_id.0 {
                return Some(event);
            }
        }
        None
    }
}

/// The direct-ledger [`TrustPath`].
///
/// The proof must be a bare transaction hash. Verification is the full
/// receipt inspection; settlement confirmation re-reads the already-on-chain
/// receipt and echoes its metadata, since there is no separate settle step
/// for a transaction that has already been mined.
#[derive(Debug, Clone)]
pub struct LedgerTrustPath<S> {
    verifier: LedgerReceiptVerifier<S>,
    service_id: ServiceId,
    network: Network,
}

impl<S: ReceiptSource> LedgerTrustPath<S> {
    pub fn new(verifier: LedgerReceiptVerifier<S>, service_id: ServiceId, network: Network) -> Self {
        Self {
            verifier,
            service_id,
            network,
        }
    }

    fn parse_proof(proof: &PaymentProof) -> Option<TxHash> {
        TxHash::from_str(proof.as_str()).ok()
    }
}

impl<S: ReceiptSource> TrustPath for LedgerTrustPath<S> {
    async fn verify(
        &self,
        proof: &PaymentProof,
        _requirements: &PaymentRequirements,
    ) -> VerificationOutcome {
        let Some(tx_hash) = Self::parse_proof(proof) else {
            return VerificationOutcome::invalid("Payment proof is not a transaction hash");
        };
        if self.verifier.verify_settled(tx_hash, &self.service_id).await {
            VerificationOutcome::Valid
        } else {
            VerificationOutcome::invalid("No matching settlement found on ledger")
        }
    }

    async fn settle(
        &self,
        proof: &PaymentProof,
        _requirements: &PaymentRequirements,
    ) -> SettlementOutcome {
        let Some(tx_hash) = Self::parse_proof(proof) else {
            return SettlementOutcome::failed_now("Payment proof is not a transaction hash");
        };
        match self.verifier.find_settled(tx_hash, &self.service_id).await {
            Some((receipt, event)) => SettlementOutcome::Settled(SettlementReceipt {
                tx_hash: Some(tx_hash.to_string()),
                from: Some(event.payer.into()),
                to: receipt.to.map(Into::into),
                value: Some(crate::types::TokenAmount(event.amount)),
                block_number: receipt.block_number,
                network: Some(self.network),
                timestamp: Some(event.timestamp.to_string()),
            }),
            None => SettlementOutcome::failed_now("Settlement no longer visible on ledger"),
        }
    }
}
