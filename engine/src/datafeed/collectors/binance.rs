//! Binance spot market data

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use shared::models::from_epoch_ms;
use tidetrader_core::data::{PriceBar, Ticker24h, Timeframe};

const SPOT_API: &str = "https://api.binance.com";
/// Public data mirror, used for kline history
const DATA_API: &str = "https://data-api.binance.vision";

/// Single provider request ceiling
pub const MAX_KLINE_LIMIT: usize = 1000;

#[derive(Clone)]
pub struct BinanceCollector {
    client: reqwest::Client,
    spot_url: String,
    data_url: String,
}

impl BinanceCollector {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            spot_url: SPOT_API.to_string(),
            data_url: DATA_API.to_string(),
        }
    }

    fn pair(symbol: &str) -> String {
        format!("{}USDT", symbol.to_uppercase())
    }

    pub async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h> {
        let url = format!("{}/api/v3/ticker/24hr", self.spot_url);
        let body: Value = self
            .client
            .get(&url)
            .query(&[("symbol", Self::pair(symbol))])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Ticker24h {
            symbol: symbol.to_uppercase(),
            price: field_f64(&body, "lastPrice")?,
            change_24h_pct: field_f64(&body, "priceChangePercent")?,
            high_24h: field_f64(&body, "highPrice")?,
            low_24h: field_f64(&body, "lowPrice")?,
            volume_24h: field_f64(&body, "quoteVolume")?,
        })
    }

    /// Kline history from the data mirror, oldest first
    pub async fn klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_time_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        let url = format!("{}/api/v3/klines", self.data_url);
        let mut query: Vec<(String, String)> = vec![
            ("symbol".into(), Self::pair(symbol)),
            ("interval".into(), timeframe.as_str().to_string()),
            ("limit".into(), limit.min(MAX_KLINE_LIMIT).to_string()),
        ];
        if let Some(start) = start_time_ms {
            query.push(("startTime".into(), start.to_string()));
        }

        let rows: Vec<Value> = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        rows.iter().map(parse_kline_row).collect()
    }

    /// Close prices for a raw provider interval (e.g. "1w"), outside the
    /// engine's own timeframe set; used by the on-chain valuation math
    pub async fn closes_for_interval(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<f64>> {
        let url = format!("{}/api/v3/klines", self.data_url);
        let rows: Vec<Value> = self
            .client
            .get(&url)
            .query(&[
                ("symbol", Self::pair(symbol)),
                ("interval", interval.to_string()),
                ("limit", limit.min(MAX_KLINE_LIMIT).to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        rows.iter()
            .map(|row| parse_kline_row(row).map(|bar| bar.close))
            .collect()
    }
}

fn parse_kline_row(row: &Value) -> Result<PriceBar> {
    let cells = row.as_array().ok_or_else(|| anyhow!("kline row is not an array"))?;
    if cells.len() < 6 {
        return Err(anyhow!("kline row too short: {} cells", cells.len()));
    }
    let open_time = cells[0]
        .as_i64()
        .ok_or_else(|| anyhow!("kline open_time is not an integer"))?;

    let cell_f64 = |i: usize| -> Result<f64> {
        cells[i]
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| cells[i].as_f64())
            .ok_or_else(|| anyhow!("kline cell {} is not numeric", i))
    };

    Ok(PriceBar {
        open_time: from_epoch_ms(open_time),
        open: cell_f64(1)?,
        high: cell_f64(2)?,
        low: cell_f64(3)?,
        close: cell_f64(4)?,
        volume: cell_f64(5)?,
    })
}

fn field_f64(body: &Value, field: &str) -> Result<f64> {
    body.get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .or_else(|| body.get(field).and_then(|v| v.as_f64()))
        .with_context(|| format!("missing numeric field {}", field))
}
