//! Bootstrap REST client
//!
//! Pull-style operations issued once on first activation to pre-populate
//! state before the first push arrives. Never polled afterwards; the stream
//! is the only ongoing data path.

use crate::core::{now_millis, ExchangeRateSnapshot, Opportunity, PriceTick};
use crate::{Result, SyncError};
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const PRICES_PATH: &str = "/api/prices";
const OPPORTUNITIES_PATH: &str = "/api/opportunities";
const EXCHANGE_RATE_PATH: &str = "/api/exchange-rate";

/// HTTP client for the one-shot bootstrap pulls
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base: String = base_url.into();
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Rest(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base.trim_end_matches('/').to_string(),
        })
    }

    /// Current full tick set
    pub async fn fetch_prices(&self) -> Result<Vec<PriceTick>> {
        let mut ticks: Vec<PriceTick> = self.get_json(PRICES_PATH).await?;
        let now = now_millis();
        for tick in &mut ticks {
            tick.received_at = now;
        }
        Ok(ticks)
    }

    /// Current live opportunity set
    pub async fn fetch_opportunities(&self) -> Result<Vec<Opportunity>> {
        let mut opportunities: Vec<Opportunity> = self.get_json(OPPORTUNITIES_PATH).await?;
        let now = now_millis();
        for opp in &mut opportunities {
            opp.received_at = now;
        }
        Ok(opportunities)
    }

    /// Current reference rates
    pub async fn fetch_exchange_rate(&self) -> Result<ExchangeRateSnapshot> {
        let mut snapshot: ExchangeRateSnapshot = self.get_json(EXCHANGE_RATE_PATH).await?;
        snapshot.received_at = now_millis();
        Ok(snapshot)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::Rest(format!("GET {url}: {e}")))?
            .error_for_status()
            .map_err(|e| SyncError::Rest(format!("GET {url}: {e}")))?;
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::Rest(format!("GET {url}: bad body: {e}")))
    }
}
