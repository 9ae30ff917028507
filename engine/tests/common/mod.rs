//! Shared fixtures for the engine integration tests

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::collections::HashMap;
use std::sync::Mutex;
use tidetrader_core::data::{
    Availability, EtfFlows, FearGreed, MacroRates, MinerStats, OnchainStats, StablecoinSupply,
    Ticker24h, Timeframe,
};
use tidetrader_core::strategy::{KlineWindow, MarketData};

use engine::services::broker::PriceFeed;

/// Fresh in-memory store with the full schema. A single connection keeps
/// every handle on the same memory database.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("in-memory sqlite");
    Migrator::up(&db, None).await.expect("migrations");
    db
}

/// Market fixture with per-symbol spot prices; everything else is Absent
#[derive(Default)]
pub struct FixtureMarket {
    prices: Mutex<HashMap<String, f64>>,
}

impl FixtureMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_uppercase(), price);
    }

    fn price(&self, symbol: &str) -> Option<f64> {
        self.prices
            .lock()
            .unwrap()
            .get(&symbol.to_uppercase())
            .copied()
    }
}

#[async_trait]
impl MarketData for FixtureMarket {
    async fn klines(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _limit: usize,
    ) -> Availability<KlineWindow> {
        Availability::Absent
    }

    async fn ticker(&self, symbol: &str) -> Availability<Ticker24h> {
        match self.price(symbol) {
            Some(price) => Availability::Fresh(Ticker24h {
                symbol: symbol.to_uppercase(),
                price,
                change_24h_pct: 0.0,
                high_24h: price,
                low_24h: price,
                volume_24h: 0.0,
            }),
            None => Availability::Absent,
        }
    }

    async fn macro_rates(&self) -> Availability<MacroRates> {
        Availability::Absent
    }

    async fn fear_greed(&self) -> Availability<FearGreed> {
        Availability::Absent
    }

    async fn etf_flows(&self) -> Availability<EtfFlows> {
        Availability::Absent
    }

    async fn onchain_btc(&self) -> Availability<OnchainStats> {
        Availability::Absent
    }

    async fn miners(&self) -> Availability<MinerStats> {
        Availability::Absent
    }

    async fn stablecoin_supply(&self) -> Availability<StablecoinSupply> {
        Availability::Absent
    }

    async fn mnav(&self) -> Availability<f64> {
        Availability::Absent
    }
}

#[async_trait]
impl PriceFeed for FixtureMarket {
    async fn last_price(&self, symbol: &str) -> Option<f64> {
        self.price(symbol)
    }
}
