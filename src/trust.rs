//! The trust-path capability for confirming payments.
//!
//! The gate confirms a payment through one of two alternative trust paths:
//! delegated verification and settlement via a remote facilitator
//! ([`crate::facilitator_client::FacilitatorClient`]), or direct inspection
//! of the transaction receipt on the ledger
//! ([`crate::ledger::LedgerTrustPath`]). The gate state machine is written
//! once against this trait and parameterized by whichever path is configured.
//!
//! Both operations are infallible by construction: transport failures,
//! timeouts, and malformed responses are normalized into
//! [`VerificationOutcome::Invalid`] or [`SettlementOutcome::Failed`] before
//! they reach the gate, and no error path may ever read as success.

use std::sync::Arc;

use crate::types::{PaymentProof, PaymentRequirements, SettlementOutcome, VerificationOutcome};

/// Asynchronous interface for confirming an x402 payment.
///
/// Implementors must uphold the fail-closed contract described in the module
/// documentation. Callers must only invoke [`TrustPath::settle`] after
/// [`TrustPath::verify`] returned [`VerificationOutcome::Valid`] for the same
/// proof and requirements.
pub trait TrustPath: Send + Sync {
    /// Checks whether the proof satisfies the payment requirements.
    fn verify(
        &self,
        proof: &PaymentProof,
        requirements: &PaymentRequirements,
    ) -> impl Future<Output = VerificationOutcome> + Send;

    /// Confirms on-chain settlement of a verified proof.
    ///
    /// On the facilitator path this executes the settlement; on the ledger
    /// path the transaction is already on-chain and this echoes its receipt.
    fn settle(
        &self,
        proof: &PaymentProof,
        requirements: &PaymentRequirements,
    ) -> impl Future<Output = SettlementOutcome> + Send;
}

impl<T: TrustPath> TrustPath for Arc<T> {
    fn verify(
        &self,
        proof: &PaymentProof,
        requirements: &PaymentRequirements,
    ) -> impl Future<Output = VerificationOutcome> + Send {
        self.as_ref().verify(proof, requirements)
    }

    fn settle(
        &self,
        proof: &PaymentProof,
        requirements: &PaymentRequirements,
    ) -> impl Future<Output = SettlementOutcome> + Send {
        self.as_ref().settle(proof, requirements)
    }
}
