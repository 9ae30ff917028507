//! On-chain BTC valuation stats
//!
//! ahr999 = (price / 200-day DCA cost) * (price / fitted growth value)
//! where the fitted value is 10^(5.84*log10(age_days) - 17.01) against the
//! genesis block. MVRV comes from the Coin Metrics community API; hashrate
//! and halving distance from mempool.space.

use super::binance::BinanceCollector;
use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tidetrader_core::data::{OnchainStats, Timeframe};

const MEMPOOL_API: &str = "https://mempool.space/api";
const COINMETRICS_API: &str =
    "https://community-api.coinmetrics.io/v4/timeseries/asset-metrics";

const HALVING_INTERVAL_BLOCKS: i64 = 210_000;

#[derive(Clone)]
pub struct OnchainCollector {
    client: reqwest::Client,
    binance: BinanceCollector,
}

impl OnchainCollector {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            binance: BinanceCollector::new(client.clone()),
            client,
        }
    }

    pub async fn stats(&self) -> Result<OnchainStats> {
        let (ahr999, wma200, mvrv, hashrate, halving) = tokio::join!(
            self.ahr999(),
            self.wma200(),
            self.mvrv(),
            self.hashrate_ehs(),
            self.halving_days(),
        );

        let stats = OnchainStats {
            ahr999: ahr999.ok(),
            mvrv_ratio: mvrv.ok(),
            wma200: wma200.ok(),
            hashrate_ehs: hashrate.ok(),
            halving_days: halving.ok(),
        };
        if stats.ahr999.is_none() && stats.mvrv_ratio.is_none() && stats.wma200.is_none() {
            return Err(anyhow!("no on-chain metric resolved"));
        }
        Ok(stats)
    }

    async fn ahr999(&self) -> Result<f64> {
        let bars = self.binance.klines("BTC", Timeframe::D1, None, 200).await?;
        if bars.is_empty() {
            return Err(anyhow!("no daily bars for ahr999"));
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let price = *closes.last().expect("non-empty");
        let ma200 = closes.iter().sum::<f64>() / closes.len() as f64;

        let genesis = Utc.with_ymd_and_hms(2009, 1, 3, 0, 0, 0).single().expect("valid date");
        let age_days = (Utc::now() - genesis).num_days() as f64;
        let fitted = 10f64.powf(5.84 * age_days.log10() - 17.01);

        Ok((price / ma200) * (price / fitted))
    }

    async fn wma200(&self) -> Result<f64> {
        let closes = self.binance.closes_for_interval("BTC", "1w", 200).await?;
        if closes.is_empty() {
            return Err(anyhow!("no weekly closes"));
        }
        Ok(closes.iter().sum::<f64>() / closes.len() as f64)
    }

    async fn mvrv(&self) -> Result<f64> {
        let body: Value = self
            .client
            .get(COINMETRICS_API)
            .query(&[
                ("assets", "btc"),
                ("metrics", "CapMVRVCur"),
                ("frequency", "1d"),
                ("page_size", "1"),
                ("sort", "time"),
                ("order", "descending"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body.get("data")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .and_then(|row| row.get("CapMVRVCur"))
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("MVRV missing from Coin Metrics response"))
    }

    async fn hashrate_ehs(&self) -> Result<f64> {
        let body: Value = self
            .client
            .get(format!("{}/v1/mining/hashrate/1m", MEMPOOL_API))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body.get("currentHashrate")
            .and_then(|v| v.as_f64())
            .or_else(|| {
                body.get("hashrates")
                    .and_then(|h| h.as_array())
                    .and_then(|h| h.last())
                    .and_then(|h| h.get("avgHashrate"))
                    .and_then(|v| v.as_f64())
            })
            .map(|hs| hs / 1e18)
            .ok_or_else(|| anyhow!("hashrate missing from mempool response"))
    }

    async fn halving_days(&self) -> Result<i64> {
        let height: i64 = self
            .client
            .get(format!("{}/blocks/tip/height", MEMPOOL_API))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?
            .trim()
            .parse()?;

        let next_halving = (height / HALVING_INTERVAL_BLOCKS + 1) * HALVING_INTERVAL_BLOCKS;
        let blocks_left = next_halving - height;
        // ten-minute target block time
        Ok(blocks_left * 10 / (60 * 24))
    }
}
