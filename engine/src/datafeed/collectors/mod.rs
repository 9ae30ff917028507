//! Upstream collectors
//!
//! One collector per provider, all sharing a single pooled HTTP client.
//! Collectors return typed records or fail; resilience (TTL, staleness,
//! single-flight) lives in the cache layer above them.

pub mod binance;
pub mod etf_flows;
pub mod fear_greed;
pub mod fred;
pub mod mining;
pub mod onchain;
pub mod stablecoin;
pub mod stock_nav;

pub use binance::BinanceCollector;
pub use etf_flows::EtfFlowCollector;
pub use fear_greed::FearGreedCollector;
pub use fred::FredCollector;
pub use mining::MiningCollector;
pub use onchain::OnchainCollector;
pub use stablecoin::StablecoinCollector;
pub use stock_nav::StockNavCollector;

use super::cache::{Fetcher, SourceKey, SourceValue};
use async_trait::async_trait;

/// Dispatches cache misses to the provider collectors
pub struct UpstreamFetcher {
    pub binance: BinanceCollector,
    pub fred: FredCollector,
    pub fear_greed: FearGreedCollector,
    pub etf_flows: EtfFlowCollector,
    pub onchain: OnchainCollector,
    pub mining: MiningCollector,
    pub stablecoin: StablecoinCollector,
    pub stock_nav: StockNavCollector,
}

impl UpstreamFetcher {
    pub fn new(client: reqwest::Client, fred_api_key: Option<String>) -> Self {
        Self {
            binance: BinanceCollector::new(client.clone()),
            fred: FredCollector::new(client.clone(), fred_api_key),
            fear_greed: FearGreedCollector::new(client.clone()),
            etf_flows: EtfFlowCollector::new(client.clone()),
            onchain: OnchainCollector::new(client.clone()),
            mining: MiningCollector::new(client.clone()),
            stablecoin: StablecoinCollector::new(client.clone()),
            stock_nav: StockNavCollector::new(client),
        }
    }
}

#[async_trait]
impl Fetcher for UpstreamFetcher {
    async fn fetch(&self, key: &SourceKey) -> anyhow::Result<SourceValue> {
        match key {
            SourceKey::Ticker24h(symbol) => {
                Ok(SourceValue::Ticker(self.binance.ticker_24h(symbol).await?))
            }
            SourceKey::MacroFred => Ok(SourceValue::Macro(self.fred.macro_rates().await?)),
            SourceKey::FearGreed => {
                Ok(SourceValue::FearGreed(self.fear_greed.current().await?))
            }
            SourceKey::EtfFlows => Ok(SourceValue::Etf(self.etf_flows.daily_flows().await?)),
            SourceKey::OnchainBtc => Ok(SourceValue::Onchain(self.onchain.stats().await?)),
            SourceKey::Miners => Ok(SourceValue::Miners(self.mining.miner_stats().await?)),
            SourceKey::StablecoinSupply => {
                Ok(SourceValue::Stablecoin(self.stablecoin.supply().await?))
            }
            SourceKey::MstrMnav => {
                let btc = self.binance.ticker_24h("BTC").await?;
                Ok(SourceValue::Mnav(self.stock_nav.mnav("MSTR", btc.price).await?))
            }
        }
    }
}
