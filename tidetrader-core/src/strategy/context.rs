//! Read-only evaluation context
//!
//! Evaluators see the market through the [`MarketData`] trait (implemented
//! by the engine's TTL cache, and by fixtures in tests) and the account
//! through an immutable snapshot. The optional [`Advisor`] is the
//! best-effort language-model enrichment used by the macro evaluator.

use crate::broker::AccountSnapshot;
use crate::data::{
    Availability, BarSeries, EtfFlows, FearGreed, MacroRates, MinerStats, OnchainStats,
    StablecoinSupply, Ticker24h, Timeframe,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where a kline response was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KlineSource {
    /// Served from the local bar store
    Local,
    /// Local store was empty; live values fetched as a fallback
    ProviderLive,
}

#[derive(Debug, Clone)]
pub struct KlineWindow {
    pub series: BarSeries,
    pub source: KlineSource,
}

/// Read-only market view. Lookups never fail hard: upstream trouble shows
/// up as `Stale` or `Absent` and evaluators score around it.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Availability<KlineWindow>;

    async fn ticker(&self, symbol: &str) -> Availability<Ticker24h>;

    async fn macro_rates(&self) -> Availability<MacroRates>;

    async fn fear_greed(&self) -> Availability<FearGreed>;

    async fn etf_flows(&self) -> Availability<EtfFlows>;

    async fn onchain_btc(&self) -> Availability<OnchainStats>;

    async fn miners(&self) -> Availability<MinerStats>;

    async fn stablecoin_supply(&self) -> Availability<StablecoinSupply>;

    /// MSTR market cap over its BTC holdings value
    async fn mnav(&self) -> Availability<f64>;
}

/// One scored macro indicator row, also the advisory request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredIndicator {
    pub name: String,
    pub display: String,
    pub score: i8,
    pub weight: u8,
    pub available: bool,
}

/// Request to the advisory model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub symbol: String,
    pub price: Option<f64>,
    pub change_24h_pct: Option<f64>,
    pub fear_greed: Option<u8>,
    pub scored: Vec<ScoredIndicator>,
}

/// Best-effort advisory model client; failure is never fatal and the reply
/// never changes an action or conviction.
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, request: &AdvisoryRequest) -> anyhow::Result<String>;
}

/// Context handed to [`super::Evaluator::evaluate`]
pub struct EvalContext<'a> {
    pub market: &'a dyn MarketData,
    pub account: &'a AccountSnapshot,
    pub advisor: Option<&'a dyn Advisor>,
}
