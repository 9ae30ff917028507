//! Daily spot-ETF net flows
//!
//! The upstream is any endpoint returning `[{"symbol": "...",
//! "value_usd": ...}, ...]` for the latest trading day; the default points
//! at the flow mirror the dashboard deployment runs.

use anyhow::Result;
use serde::Deserialize;
use tidetrader_core::data::EtfFlows;

const DEFAULT_API_URL: &str = "https://api.sosovalue.com/etf/v1/flows/daily";

#[derive(Debug, Deserialize)]
struct FlowRow {
    symbol: String,
    value_usd: f64,
}

#[derive(Clone)]
pub struct EtfFlowCollector {
    client: reqwest::Client,
    api_url: String,
}

impl EtfFlowCollector {
    pub fn new(client: reqwest::Client) -> Self {
        let api_url = std::env::var("ETF_FLOW_API_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self { client, api_url }
    }

    pub async fn daily_flows(&self) -> Result<EtfFlows> {
        let rows: Vec<FlowRow> = self
            .client
            .get(&self.api_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let pick = |asset: &str| {
            rows.iter()
                .find(|r| r.symbol.eq_ignore_ascii_case(asset))
                .map(|r| r.value_usd)
        };

        Ok(EtfFlows {
            btc_usd: pick("BTC"),
            eth_usd: pick("ETH"),
            sol_usd: pick("SOL"),
        })
    }
}
