//! Total stablecoin supply (DefiLlama)

use anyhow::{anyhow, Result};
use serde_json::Value;
use tidetrader_core::data::StablecoinSupply;

const API_URL: &str = "https://stablecoins.llama.fi/stablecoincharts/all";

/// Chart entries are daily; ninety entries back approximates the 90-day lag
const LAG_DAYS: usize = 90;

#[derive(Clone)]
pub struct StablecoinCollector {
    client: reqwest::Client,
}

impl StablecoinCollector {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn supply(&self) -> Result<StablecoinSupply> {
        let body: Value = self
            .client
            .get(API_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let points = body
            .as_array()
            .ok_or_else(|| anyhow!("malformed stablecoin chart response"))?;
        let pegged_usd = |point: &Value| -> Option<f64> {
            point
                .get("totalCirculatingUSD")
                .or_else(|| point.get("totalCirculating"))
                .and_then(|t| t.get("peggedUSD"))
                .and_then(|v| v.as_f64())
        };

        let latest = points
            .last()
            .and_then(pegged_usd)
            .ok_or_else(|| anyhow!("stablecoin chart has no usable tail"))?;
        let lagged = points
            .len()
            .checked_sub(LAG_DAYS + 1)
            .and_then(|i| points.get(i))
            .and_then(pegged_usd);

        Ok(StablecoinSupply {
            total_usd_b: latest / 1e9,
            lag_90d_usd_b: lagged.map(|v| v / 1e9),
        })
    }
}
