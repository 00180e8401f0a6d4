//! Upstream clients for the agent endpoints.
//!
//! The price feed is the protected resource behind the payment gate: spot
//! prices in USD with 24h change, fetched from a CoinGecko-compatible
//! `simple/price` endpoint. The chat proxy forwards to an OpenAI-compatible
//! chat-completions endpoint. Both calls are bounded by the configured
//! request timeout; neither holds any per-request state.

use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

/// Coins returned when the client does not ask for specific symbols.
const DEFAULT_COINS: [&str; 2] = ["bitcoin", "ethereum"];
/// Upper bound on coins per request, to keep the upstream query bounded.
const MAX_COINS: usize = 5;

/// Errors from the upstream data providers.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid upstream URL: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream returned status {0}")]
    UpstreamStatus(reqwest::StatusCode),
    #[error("OpenAI API key is not configured")]
    MissingApiKey,
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(&'static str),
}

/// Client for the price-feed and chat upstreams.
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: Client,
    price_api: Url,
    chat_api: Url,
    openai_api_key: Option<String>,
    timeout: Duration,
}

impl AgentClient {
    pub fn new(
        price_api: &str,
        chat_api: &str,
        openai_api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        Ok(Self {
            http: Client::new(),
            price_api: normalized(price_api)?,
            chat_api: normalized(chat_api)?,
            openai_api_key,
            timeout,
        })
    }

    /// Splits a `symbols` query value into a bounded list of coin ids.
    ///
    /// Empty or absent input falls back to the default coins; at most
    /// [`MAX_COINS`] entries are kept.
    pub fn coins_from_query(symbols: Option<&str>) -> Vec<String> {
        let coins: Vec<String> = symbols
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .take(MAX_COINS)
            .collect();
        if coins.is_empty() {
            DEFAULT_COINS.iter().map(|s| s.to_string()).collect()
        } else {
            coins
        }
    }

    /// Fetches USD spot prices with 24h change for the given coin ids.
    #[tracing::instrument(skip(self))]
    pub async fn prices(&self, coins: &[String]) -> Result<Value, AgentError> {
        let mut url = self.price_api.join("./simple/price")?;
        url.query_pairs_mut()
            .append_pair("ids", &coins.join(","))
            .append_pair("vs_currencies", "usd")
            .append_pair("include_24hr_change", "true");

        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AgentError::UpstreamStatus(response.status()));
        }
        Ok(response.json::<Value>().await?)
    }

    /// Proxies one chat message to the chat-completions upstream and returns
    /// the assistant's reply.
    #[tracing::instrument(skip_all)]
    pub async fn chat(&self, message: &str) -> Result<String, AgentError> {
        let api_key = self
            .openai_api_key
            .as_deref()
            .ok_or(AgentError::MissingApiKey)?;
        let url = self.chat_api.join("./chat/completions")?;

        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&json!({
                "model": "gpt-4",
                "messages": [
                    { "role": "system", "content": "You are a helpful assistant." },
                    { "role": "user", "content": message },
                ],
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AgentError::UpstreamStatus(response.status()));
        }

        let body = response.json::<Value>().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(AgentError::MalformedResponse("no choices in response"))?;
        Ok(content.to_string())
    }
}

/// Normalizes a base URL to end with a single slash so relative joins keep
/// the full base path.
fn normalized(base: &str) -> Result<Url, url::ParseError> {
    let mut normalized = base.trim_end_matches('/').to_string();
    normalized.push('/');
    Url::parse(&normalized)
}
