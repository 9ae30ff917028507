//! Crypto Fear & Greed index (alternative.me)

use anyhow::{anyhow, Result};
use serde_json::Value;
use tidetrader_core::data::FearGreed;

const API_URL: &str = "https://api.alternative.me/fng/";

#[derive(Clone)]
pub struct FearGreedCollector {
    client: reqwest::Client,
}

impl FearGreedCollector {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn current(&self) -> Result<FearGreed> {
        let body: Value = self
            .client
            .get(API_URL)
            .query(&[("limit", "1"), ("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let entry = body
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .ok_or_else(|| anyhow!("empty fear & greed response"))?;

        let value: u8 = entry
            .get("value")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("fear & greed value missing"))?;
        let classification = entry
            .get("value_classification")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string();

        Ok(FearGreed {
            value: value.min(100),
            classification,
        })
    }
}
