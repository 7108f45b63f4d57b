//! Grinex (ex-Garantex) depth API client
//!
//! Reads the public order book for a single market and turns the best bid
//! into a [`Rate`]. No API key required.
//!
//! One HTTP round trip per call: no retries, no caching, no rate limiting.

use super::rate_source::RateSource;
use crate::models::Rate;
use crate::utils::money::{parse_price, PriceParseError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://grinex.io";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// The only market this service reads
pub const MARKET: &str = "btcusdt";
const DEPTH_PATH: &str = "/api/v2/depth";

/// Errors raised while acquiring a rate from the exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to make request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("unexpected status code: {status}, body: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("failed to unmarshal response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no bid prices available")]
    NoLiquidity,

    #[error("failed to parse bid price: {0}")]
    MalformedPrice(#[from] PriceParseError),
}

/// Depth endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct DepthResponse {
    /// Exchange-side timestamp (unix seconds). Not used for the rate.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub asks: Vec<OrderBookEntry>,
    #[serde(default)]
    pub bids: Vec<OrderBookEntry>,
}

/// One price level of the order book
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookEntry {
    pub price: String,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub factor: String,
    #[serde(default, rename = "type")]
    pub entry_type: String,
}

impl DepthResponse {
    /// Parse a raw depth response body
    pub fn from_slice(body: &[u8]) -> Result<Self, ExchangeError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Derive a rate from the best bid, stamped with `acquired_at`.
    ///
    /// Only `bids[0]` is consulted; asks and deeper levels are ignored.
    pub fn to_rate(&self, acquired_at: DateTime<Utc>) -> Result<Rate, ExchangeError> {
        let best_bid = self.bids.first().ok_or(ExchangeError::NoLiquidity)?;
        let bid = parse_price(&best_bid.price)?;
        Ok(Rate::from_best_bid(bid, acquired_at))
    }
}

/// Exchange client implementing [`RateSource`]
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    client: Client,
    base_url: String,
}

impl ExchangeClient {
    /// Create a new client with the given base URL and per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("GarantexRates/1.0")
            .build()
            .map_err(ExchangeError::Client)?;

        Ok(Self::with_client(base_url, client))
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full depth URL for the configured market
    fn depth_url(&self) -> String {
        format!("{}{}?market={}", self.base_url, DEPTH_PATH, MARKET)
    }

    /// Fetch the order book and derive the current rate
    pub async fn get_rate(&self) -> Result<Rate, ExchangeError> {
        let url = self.depth_url();

        debug!("Fetching rates from exchange: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ExchangeError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(ExchangeError::Body)?;
        let depth = DepthResponse::from_slice(&body)?;
        let rate = depth.to_rate(Utc::now())?;

        info!(
            "Successfully fetched rates: ask={} bid={} timestamp={}",
            rate.ask,
            rate.bid,
            rate.timestamp.to_rfc3339()
        );

        Ok(rate)
    }
}

#[async_trait]
impl RateSource for ExchangeClient {
    fn source_name(&self) -> &str {
        "Grinex"
    }

    async fn fetch_rate(&self) -> Result<Rate, ExchangeError> {
        self.get_rate().await
    }
}
