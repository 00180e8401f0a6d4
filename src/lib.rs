//! Payment-gated data API over the [x402 protocol](https://www.x402.org).
//!
//! This crate implements a resource server that meters access to a data API
//! behind an on-chain micropayment. A client requests a resource; the server
//! answers with `402 Payment Required` and structured payment requirements;
//! the client produces a signed payment authorization (or a bare transaction
//! hash); the server confirms the payment and only then serves the resource.
//!
//! # Architecture
//!
//! - [`requirements`] — derives the canonical [`types::PaymentRequirements`]
//!   for the protected service from static configuration. Pure and
//!   deterministic.
//! - [`trust`] — the [`trust::TrustPath`] capability: `verify` then `settle`,
//!   with all failures normalized into typed outcomes (fail-closed).
//! - [`facilitator_client`] — delegated trust path: verification and
//!   settlement via a remote x402 facilitator over HTTP.
//! - [`ledger`] — direct trust path: inspects the transaction receipt on the
//!   ledger for a matching `PaymentSettled` event.
//! - [`gate`] — the payment gate state machine that drives a request from
//!   proof inspection through verification and settlement to a grant.
//! - [`handlers`] — the Axum HTTP surface: the gated price-feed endpoint, the
//!   companion chat proxy, and the health probe.
//!
//! The two trust paths share one gate: the state machine is written once
//! against [`trust::TrustPath`] and parameterized by whichever path is
//! configured.

pub mod agent;
pub mod config;
pub mod facilitator_client;
pub mod gate;
pub mod handlers;
pub mod ledger;
pub mod network;
pub mod requirements;
pub mod sig_down;
pub mod timestamp;
pub mod trust;
pub mod types;
