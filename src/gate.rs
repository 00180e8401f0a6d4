//! The payment gate state machine.
//!
//! One pass per request, no retries (retries are the client's responsibility
//! via a new request):
//!
//! 1. No proof supplied — build the payment requirements and challenge the
//!    client with them. Terminal.
//! 2. Proof supplied — re-derive the identical requirements and run the trust
//!    path's verification. An invalid proof rejects the request. Terminal.
//! 3. Verified — confirm settlement. A failed settlement rejects the
//!    request. Terminal.
//! 4. Settled — issue a [`Grant`] and run the protected handler exactly once.
//!    The settlement receipt is echoed in the response regardless of how the
//!    handler fares: once the payment is economically consummated, a handler
//!    failure is reported inside the payload, not as a transport error.
//!
//! Ordering invariants are enforced by control flow, not by convention:
//! settlement is unreachable before a `Valid` verification, and the handler
//! is unreachable before a `Settled` confirmation.

use serde_json::{Value, json};

use crate::network::Network;
use crate::requirements::{self, ServiceConfig};
use crate::trust::TrustPath;
use crate::types::{
    EvmAddress, PaymentProof, PaymentRequirements, ServiceId, SettlementOutcome,
    SettlementReceipt, VerificationOutcome,
};

/// The per-request authorization to execute the protected handler.
///
/// Ephemeral and never persisted: created only after settlement is confirmed
/// inside a single request's handling, consumed by that request's handler,
/// and gone when the request ends. There is no cross-request caching — a
/// request without a fresh settlement must re-pay or re-prove.
#[derive(Debug)]
pub struct Grant {
    service: ServiceId,
    receipt: SettlementReceipt,
}

impl Grant {
    /// The service this grant unlocks.
    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    /// The confirmed settlement backing this grant.
    pub fn receipt(&self) -> &SettlementReceipt {
        &self.receipt
    }
}

/// Why a paid request was rejected before any grant was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The trust path declined the proof.
    InvalidProof { reason: String },
    /// The proof verified but settlement could not be confirmed.
    SettlementFailed { reason: String },
}

/// Terminal result of driving one request through the gate.
#[derive(Debug)]
pub enum GateOutcome {
    /// No proof was supplied; the client owes a payment matching `requirements`.
    Unpaid { requirements: PaymentRequirements },
    /// The proof was supplied but did not lead to a grant.
    Rejected(Rejection),
    /// Payment settled and the protected handler ran. `data` is the handler's
    /// payload (or its folded-in failure), `payment` the settlement receipt.
    Granted {
        data: Value,
        payment: SettlementReceipt,
    },
}

/// Error returned by a protected resource handler.
///
/// Reaching the handler at all means the payment has been captured, so this
/// is folded into the granted response payload rather than propagated.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Drives unauthenticated resource requests through challenge, verification,
/// settlement, and grant, against a configured [`TrustPath`].
///
/// Stateless across requests: the only data carried between requests is
/// read-only configuration.
#[derive(Debug, Clone)]
pub struct PaymentGate<P> {
    trust: P,
    service: ServiceConfig,
    network: Network,
    pay_to: EvmAddress,
}

impl<P> PaymentGate<P> {
    pub fn new(trust: P, service: ServiceConfig, network: Network, pay_to: EvmAddress) -> Self {
        Self {
            trust,
            service,
            network,
            pay_to,
        }
    }

    /// The canonical requirements for this service and network.
    ///
    /// Deterministic: the challenge issued on the first pass and the
    /// requirements sent to the trust path on the second pass are identical.
    pub fn requirements(&self) -> PaymentRequirements {
        requirements::build(&self.service, self.network, self.pay_to)
    }
}

impl<P> PaymentGate<P>
where
    P: TrustPath + Clone + 'static,
{
    /// Handles one resource request.
    ///
    /// `handler` is the caller-supplied protected resource handler; it is
    /// invoked exactly once, and only when settlement has been confirmed.
    #[tracing::instrument(name = "gate.handle", skip_all, fields(service = %self.service.service_id()))]
    pub async fn handle<F, Fut>(&self, proof: Option<PaymentProof>, handler: F) -> GateOutcome
    where
        F: FnOnce(Grant) -> Fut,
        Fut: Future<Output = Result<Value, HandlerError>>,
    {
        let requirements = self.requirements();

        let Some(proof) = proof else {
            tracing::debug!("No payment proof supplied, issuing challenge");
            return GateOutcome::Unpaid { requirements };
        };

        match self.trust.verify(&proof, &requirements).await {
            VerificationOutcome::Valid => {}
            VerificationOutcome::Invalid { reason } => {
                tracing::info!(%reason, "Payment proof rejected");
                return GateOutcome::Rejected(Rejection::InvalidProof { reason });
            }
        }

        let receipt = match self.confirm_settlement(proof, requirements).await {
            SettlementOutcome::Settled(receipt) => receipt,
            SettlementOutcome::Failed { reason, .. } => {
                tracing::info!(%reason, "Settlement failed");
                return GateOutcome::Rejected(Rejection::SettlementFailed { reason });
            }
        };

        let grant = Grant {
            service: self.service.service_id(),
            receipt: receipt.clone(),
        };
        match handler(grant).await {
            Ok(data) => GateOutcome::Granted {
                data,
                payment: receipt,
            },
            Err(err) => {
                // Payment is captured and non-refundable at this layer; the
                // handler failure travels inside the paid-for response.
                tracing::warn!(error = %err, "Protected handler failed after settlement");
                GateOutcome::Granted {
                    data: json!({
                        "error": "agent_execution_failed",
                        "message": err.message,
                    }),
                    payment: receipt,
                }
            }
        }
    }

    /// Runs settlement on a detached task so that a dropped request future
    /// (client disconnect) cannot abandon an in-flight settlement and leave
    /// the payment in an indeterminate state.
    async fn confirm_settlement(
        &self,
        proof: PaymentProof,
        requirements: PaymentRequirements,
    ) -> SettlementOutcome {
        let trust = self.trust.clone();
        let task = tokio::spawn(async move { trust.settle(&proof, &requirements).await });
        match task.await {
            Ok(outcome) => outcome,
            Err(err) => SettlementOutcome::failed_now(format!("Settlement task failed: {err}")),
        }
    }
}
