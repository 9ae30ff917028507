//! Miner profitability from WhatToMine network data
//!
//! Daily BTC yield per TH/s comes from block reward and network hashrate;
//! a rig is profitable when spot trades above its shutdown price (daily
//! power cost over daily yield).

use anyhow::{anyhow, Result};
use serde_json::Value;
use tidetrader_core::data::MinerStats;

const API_URL: &str = "https://whattomine.com/coins/1.json";

/// Mainstream rig parameters: (name, hashrate TH/s, power W).
/// Maintained by hand from vendor spec sheets.
const KNOWN_MINERS: [(&str, f64, f64); 10] = [
    ("Antminer S21 XP Hyd", 473.0, 5676.0),
    ("Antminer S21 Pro", 234.0, 3510.0),
    ("Antminer S21", 200.0, 3500.0),
    ("Antminer S19 XP Hyd", 255.0, 5304.0),
    ("Antminer S19 Pro", 110.0, 3250.0),
    ("Whatsminer M60S", 186.0, 3441.0),
    ("Whatsminer M50S", 126.0, 3276.0),
    ("Avalon A1566", 185.0, 5180.0),
    ("Antminer S19k Pro", 120.0, 2760.0),
    ("Antminer S19j Pro", 96.0, 3068.0),
];

const ELECTRIC_FEE_USD_PER_KWH: f64 = 0.06;

#[derive(Clone)]
pub struct MiningCollector {
    client: reqwest::Client,
}

impl MiningCollector {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn miner_stats(&self) -> Result<MinerStats> {
        let body: Value = self
            .client
            .get(API_URL)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let block_reward = number(&body, "block_reward").unwrap_or(3.125);
        let block_time_s = number(&body, "block_time").unwrap_or(600.0);
        let nethash = number(&body, "nethash")
            .ok_or_else(|| anyhow!("WhatToMine response missing nethash"))?;
        let btc_price = number(&body, "exchange_rate")
            .ok_or_else(|| anyhow!("WhatToMine response missing exchange_rate"))?;

        let nethash_ths = nethash / 1e12;
        let blocks_per_day = 86_400.0 / block_time_s;
        let daily_btc_per_th = blocks_per_day * block_reward / nethash_ths;
        if daily_btc_per_th <= 0.0 {
            return Err(anyhow!("non-positive daily yield"));
        }

        let profitable = KNOWN_MINERS
            .iter()
            .filter(|(_, hashrate_th, power_w)| {
                let daily_power_cost = power_w * 24.0 / 1000.0 * ELECTRIC_FEE_USD_PER_KWH;
                let daily_btc = daily_btc_per_th * hashrate_th;
                let shutdown_price = daily_power_cost / daily_btc;
                btc_price > shutdown_price
            })
            .count() as u32;

        Ok(MinerStats {
            profitable,
            total: KNOWN_MINERS.len() as u32,
        })
    }
}

fn number(body: &Value, field: &str) -> Option<f64> {
    body.get(field).and_then(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    })
}
