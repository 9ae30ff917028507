//! The cache-backed `MarketData` implementation handed to evaluators

use super::cache::{MarketCache, SourceKey, SourceValue};
use super::collectors::UpstreamFetcher;
use super::kline_sync::KlineStore;
use crate::services::broker::PriceFeed;
use async_trait::async_trait;
use std::sync::Arc;
use tidetrader_core::data::{
    Availability, EtfFlows, FearGreed, MacroRates, MinerStats, OnchainStats, StablecoinSupply,
    Ticker24h, Timeframe,
};
use tidetrader_core::strategy::{KlineWindow, MarketData};
use tracing::warn;

pub struct EngineMarketData {
    cache: Arc<MarketCache<UpstreamFetcher>>,
    klines: Arc<KlineStore>,
}

impl EngineMarketData {
    pub fn new(cache: Arc<MarketCache<UpstreamFetcher>>, klines: Arc<KlineStore>) -> Self {
        Self { cache, klines }
    }
}

#[async_trait]
impl MarketData for EngineMarketData {
    async fn klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Availability<KlineWindow> {
        match self.klines.get_klines(symbol, timeframe, limit).await {
            Ok(window) if !window.series.is_empty() => Availability::Fresh(window),
            Ok(_) => Availability::Absent,
            Err(err) => {
                warn!(symbol, timeframe = %timeframe, error = %err, "kline lookup failed");
                Availability::Absent
            }
        }
    }

    async fn ticker(&self, symbol: &str) -> Availability<Ticker24h> {
        self.cache
            .get(SourceKey::Ticker24h(symbol.to_string()))
            .await
            .map(|value| match value {
                SourceValue::Ticker(t) => Some(t),
                _ => None,
            })
            .transpose_flatten()
    }

    async fn macro_rates(&self) -> Availability<MacroRates> {
        self.cache.get(SourceKey::MacroFred).await.map(|value| match value {
            SourceValue::Macro(m) => Some(m),
            _ => None,
        })
        .transpose_flatten()
    }

    async fn fear_greed(&self) -> Availability<FearGreed> {
        self.cache.get(SourceKey::FearGreed).await.map(|value| match value {
            SourceValue::FearGreed(f) => Some(f),
            _ => None,
        })
        .transpose_flatten()
    }

    async fn etf_flows(&self) -> Availability<EtfFlows> {
        self.cache.get(SourceKey::EtfFlows).await.map(|value| match value {
            SourceValue::Etf(e) => Some(e),
            _ => None,
        })
        .transpose_flatten()
    }

    async fn onchain_btc(&self) -> Availability<OnchainStats> {
        self.cache.get(SourceKey::OnchainBtc).await.map(|value| match value {
            SourceValue::Onchain(o) => Some(o),
            _ => None,
        })
        .transpose_flatten()
    }

    async fn miners(&self) -> Availability<MinerStats> {
        self.cache.get(SourceKey::Miners).await.map(|value| match value {
            SourceValue::Miners(m) => Some(m),
            _ => None,
        })
        .transpose_flatten()
    }

    async fn stablecoin_supply(&self) -> Availability<StablecoinSupply> {
        self.cache
            .get(SourceKey::StablecoinSupply)
            .await
            .map(|value| match value {
                SourceValue::Stablecoin(s) => Some(s),
                _ => None,
            })
            .transpose_flatten()
    }

    async fn mnav(&self) -> Availability<f64> {
        self.cache.get(SourceKey::MstrMnav).await.map(|value| match value {
            SourceValue::Mnav(v) => Some(v),
            _ => None,
        })
        .transpose_flatten()
    }
}

#[async_trait]
impl PriceFeed for EngineMarketData {
    async fn last_price(&self, symbol: &str) -> Option<f64> {
        self.ticker(symbol).await.value().map(|t| t.price)
    }
}

/// Collapse `Availability<Option<T>>` (a mistyped cache slot) into
/// `Availability<T>`
trait TransposeFlatten<T> {
    fn transpose_flatten(self) -> Availability<T>;
}

impl<T> TransposeFlatten<T> for Availability<Option<T>> {
    fn transpose_flatten(self) -> Availability<T> {
        match self {
            Availability::Fresh(Some(v)) => Availability::Fresh(v),
            Availability::Stale(Some(v), age) => Availability::Stale(v, age),
            _ => Availability::Absent,
        }
    }
}
