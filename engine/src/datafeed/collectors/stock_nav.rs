//! mNAV for listed BTC treasury companies
//!
//! Market cap from the Yahoo quote API divided by the value of the
//! company's BTC holdings at spot.

use anyhow::{anyhow, Result};
use serde_json::Value;

const QUOTE_API: &str = "https://query1.finance.yahoo.com/v7/finance/quote";

/// Hard-coded treasury sizes in BTC; maintained by hand from filings
const HOLDINGS: [(&str, f64); 1] = [("MSTR", 568_000.0)];

#[derive(Clone)]
pub struct StockNavCollector {
    client: reqwest::Client,
}

impl StockNavCollector {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn mnav(&self, symbol: &str, btc_price: f64) -> Result<f64> {
        let holdings = HOLDINGS
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, h)| *h)
            .ok_or_else(|| anyhow!("no holdings table entry for {}", symbol))?;
        if btc_price <= 0.0 {
            return Err(anyhow!("btc price unavailable for mnav"));
        }

        let body: Value = self
            .client
            .get(QUOTE_API)
            .query(&[("symbols", symbol)])
            .header("User-Agent", "Mozilla/5.0 (compatible; tidetrader/0.3)")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let market_cap = body
            .get("quoteResponse")
            .and_then(|q| q.get("result"))
            .and_then(|r| r.as_array())
            .and_then(|r| r.first())
            .and_then(|q| q.get("marketCap"))
            .and_then(|v| v.as_f64())
            .ok_or_else(|| anyhow!("market cap missing for {}", symbol))?;

        Ok(market_cap / (holdings * btc_price))
    }
}
