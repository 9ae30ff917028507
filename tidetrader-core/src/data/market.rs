//! Typed upstream records and the availability wrapper
//!
//! Every upstream source resolves to one of these records. Evaluators never
//! see transport errors: a lookup yields `Fresh`, `Stale` (previous value
//! retained after a failed refresh) or `Absent`, and scoring degrades
//! gracefully on the latter two.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Availability of a cached upstream value
#[derive(Debug, Clone)]
pub enum Availability<T> {
    /// Value within its TTL
    Fresh(T),
    /// TTL elapsed and the refresh failed; previous value plus its age
    Stale(T, Duration),
    /// Never had a value and the fetch failed
    Absent,
}

impl<T> Availability<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Availability::Fresh(v) | Availability::Stale(v, _) => Some(v),
            Availability::Absent => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Availability::Fresh(v) | Availability::Stale(v, _) => Some(v),
            Availability::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Availability::Absent)
    }

    /// Short marker used in trace step details
    pub fn marker(&self) -> &'static str {
        match self {
            Availability::Fresh(_) => "fresh",
            Availability::Stale(_, _) => "stale",
            Availability::Absent => "absent",
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Availability<U> {
        match self {
            Availability::Fresh(v) => Availability::Fresh(f(v)),
            Availability::Stale(v, age) => Availability::Stale(f(v), age),
            Availability::Absent => Availability::Absent,
        }
    }
}

/// 24h rolling ticker for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker24h {
    pub symbol: String,
    pub price: f64,
    pub change_24h_pct: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub volume_24h: f64,
}

/// Latest macroeconomic series (FRED)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroRates {
    pub fed_rate: Option<f64>,
    pub treasury_10y: Option<f64>,
    pub dxy: Option<f64>,
    pub m2_growth_yoy: Option<f64>,
}

/// Fear & Greed index reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FearGreed {
    /// 0 (extreme fear) .. 100 (extreme greed)
    pub value: u8,
    pub classification: String,
}

/// Daily net ETF flows in USD
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtfFlows {
    pub btc_usd: Option<f64>,
    pub eth_usd: Option<f64>,
    pub sol_usd: Option<f64>,
}

/// On-chain BTC valuation stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnchainStats {
    pub ahr999: Option<f64>,
    pub mvrv_ratio: Option<f64>,
    /// 200-week moving average price
    pub wma200: Option<f64>,
    /// Network hashrate in EH/s
    pub hashrate_ehs: Option<f64>,
    pub halving_days: Option<i64>,
}

/// Miner profitability at current hashprice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerStats {
    pub profitable: u32,
    pub total: u32,
}

impl MinerStats {
    pub fn profitable_ratio(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.profitable as f64 / self.total as f64)
        }
    }
}

/// Total stablecoin supply, USD billions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StablecoinSupply {
    pub total_usd_b: f64,
    /// Supply roughly 90 days ago, when the provider has history
    pub lag_90d_usd_b: Option<f64>,
}
