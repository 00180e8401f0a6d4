//! A [`TrustPath`] implementation that delegates to a _remote_ x402
//! facilitator over HTTP.
//!
//! The client handles the `POST /verify` and `POST /settle` endpoints of the
//! facilitator, sending `{x402Version, paymentHeader, paymentRequirements}`
//! bodies with an `X402-Version: 1` header.
//!
//! ## Error handling
//!
//! Internally, failures carry detailed context: URL construction, HTTP
//! transport, JSON deserialization, and unexpected status codes. None of that
//! escapes the trust-path boundary: the [`TrustPath`] impl converts every
//! failure into `Invalid` or `Failed` outcomes. A facilitator that cannot be
//! reached is indistinguishable, to the gate, from one that declined the
//! payment.

use http::StatusCode;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::trust::TrustPath;
use crate::types::{
    PaymentProof, PaymentRequirements, SettleRequest, SettleResponse, SettlementOutcome,
    VerificationOutcome, VerifyRequest, VerifyResponse, X402Version,
};

/// Errors that can occur while interacting with a remote facilitator.
///
/// These never reach the gate; see the module documentation.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
}

/// A client for communicating with a remote x402 facilitator.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    /// Full URL for `POST /verify` requests
    verify_url: Url,
    /// Full URL for `POST /settle` requests
    settle_url: Url,
    /// Shared Reqwest HTTP client
    client: Client,
    /// Request timeout applied to every call
    timeout: Duration,
}

impl FacilitatorClient {
    /// Constructs a new [`FacilitatorClient`] from a base URL.
    ///
    /// This sets up `./verify` and `./settle` endpoint URLs relative to the
    /// base. The timeout is mandatory so that no call to the facilitator can
    /// ever be unbounded.
    pub fn try_new(base_url: Url, timeout: Duration) -> Result<Self, FacilitatorClientError> {
        let verify_url =
            base_url
                .join("./verify")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./verify URL",
                    source: e,
                })?;
        let settle_url =
            base_url
                .join("./settle")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./settle URL",
                    source: e,
                })?;
        Ok(Self {
            client: Client::new(),
            verify_url,
            settle_url,
            timeout,
        })
    }

    /// Constructs a client from a string base URL.
    ///
    /// The URL is normalized to end with a single trailing slash so relative
    /// joins keep the full base path.
    pub fn from_base_url(value: &str, timeout: Duration) -> Result<Self, FacilitatorClientError> {
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        Self::try_new(url, timeout)
    }

    /// Returns the computed `./verify` URL.
    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    /// Returns the computed `./settle` URL.
    pub fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    /// Sends a `POST /verify` request to the facilitator.
    pub async fn post_verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        self.post_json(&self.verify_url, "POST /verify", request)
            .await
    }

    /// Sends a `POST /settle` request to the facilitator.
    pub async fn post_settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post_json(&self.settle_url, "POST /settle", request)
            .await
    }

    /// Builds the shared request body for `/verify` and `/settle`.
    fn request_body(
        proof: &PaymentProof,
        requirements: &PaymentRequirements,
    ) -> VerifyRequest {
        VerifyRequest {
            x402_version: X402Version::V1,
            payment_header: proof.clone(),
            payment_requirements: requirements.clone(),
        }
    }

    /// Generic POST helper handling JSON serialization, protocol headers,
    /// timeout application, and error mapping.
    ///
    /// `context` is a human-readable identifier used in tracing and error
    /// messages (e.g. `"POST /verify"`).
    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let http_response = self
            .client
            .post(url.clone())
            .header("X402-Version", "1")
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;

        if http_response.status() == StatusCode::OK {
            http_response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let status = http_response.status();
            let body = http_response.text().await.unwrap_or_default();
            Err(FacilitatorClientError::HttpStatus {
                context,
                status,
                body,
            })
        }
    }
}

impl TrustPath for FacilitatorClient {
    /// Verifies the proof with the facilitator's `/verify` endpoint.
    ///
    /// Fail-closed: transport failures, timeouts, non-200 responses, and
    /// malformed bodies all read as `Invalid`, never as `Valid`.
    async fn verify(
        &self,
        proof: &PaymentProof,
        requirements: &PaymentRequirements,
    ) -> VerificationOutcome {
        let request = Self::request_body(proof, requirements);
        match self.post_verify(&request).await {
            Ok(VerifyResponse { is_valid: true, .. }) => VerificationOutcome::Valid,
            Ok(VerifyResponse {
                invalid_reason, ..
            }) => VerificationOutcome::invalid(
                invalid_reason.unwrap_or_else(|| "Verification failed".to_string()),
            ),
            Err(err) => {
                tracing::warn!(error = %err, "Facilitator verify failed");
                VerificationOutcome::invalid(err.to_string())
            }
        }
    }

    /// Settles the verified proof with the facilitator's `/settle` endpoint.
    ///
    /// The facilitator is the system of record for settlement idempotence;
    /// this client surfaces whatever it reports.
    async fn settle(
        &self,
        proof: &PaymentProof,
        requirements: &PaymentRequirements,
    ) -> SettlementOutcome {
        let request = Self::request_body(proof, requirements);
        match self.post_settle(&request).await {
            Ok(response) => response.into(),
            Err(err) => {
                tracing::warn!(error = %err, "Facilitator settle failed");
                SettlementOutcome::failed_now(err.to_string())
            }
        }
    }
}
