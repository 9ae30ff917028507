//! Process-wide market data cache
//!
//! Fronts every upstream fetcher with a per-source TTL, a per-key fetch
//! timeout and per-key single-flight: concurrent callers for the same key
//! share one in-flight fetch. A failed refresh never surfaces as an error;
//! callers see the previous value as `Stale`, or `Absent` when the key
//! never resolved.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tidetrader_core::data::{
    Availability, EtfFlows, FearGreed, MacroRates, MinerStats, OnchainStats, StablecoinSupply,
    Ticker24h,
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKey {
    Ticker24h(String),
    MacroFred,
    FearGreed,
    EtfFlows,
    OnchainBtc,
    Miners,
    StablecoinSupply,
    MstrMnav,
}

impl SourceKey {
    pub fn label(&self) -> String {
        match self {
            SourceKey::Ticker24h(symbol) => format!("ticker_24h({})", symbol),
            SourceKey::MacroFred => "macro_fred".to_string(),
            SourceKey::FearGreed => "fear_greed".to_string(),
            SourceKey::EtfFlows => "etf_flows".to_string(),
            SourceKey::OnchainBtc => "onchain_btc".to_string(),
            SourceKey::Miners => "miners".to_string(),
            SourceKey::StablecoinSupply => "stablecoin_supply".to_string(),
            SourceKey::MstrMnav => "mstr_mnav".to_string(),
        }
    }
}

/// One typed record per source
#[derive(Debug, Clone)]
pub enum SourceValue {
    Ticker(Ticker24h),
    Macro(MacroRates),
    FearGreed(FearGreed),
    Etf(EtfFlows),
    Onchain(OnchainStats),
    Miners(MinerStats),
    Stablecoin(StablecoinSupply),
    Mnav(f64),
}

/// Per-source time-to-live table
#[derive(Debug, Clone)]
pub struct TtlTable {
    pub ticker_24h: Duration,
    pub macro_fred: Duration,
    pub fear_greed: Duration,
    pub etf_flows: Duration,
    pub onchain_btc: Duration,
    pub miners: Duration,
    pub stablecoin_supply: Duration,
    pub mstr_mnav: Duration,
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            ticker_24h: Duration::from_secs(60),
            macro_fred: Duration::from_secs(3600),
            fear_greed: Duration::from_secs(5 * 60),
            etf_flows: Duration::from_secs(24 * 3600),
            onchain_btc: Duration::from_secs(5 * 60),
            miners: Duration::from_secs(30 * 60),
            stablecoin_supply: Duration::from_secs(10 * 60),
            mstr_mnav: Duration::from_secs(3600),
        }
    }
}

impl TtlTable {
    fn ttl(&self, key: &SourceKey) -> Duration {
        match key {
            SourceKey::Ticker24h(_) => self.ticker_24h,
            SourceKey::MacroFred => self.macro_fred,
            SourceKey::FearGreed => self.fear_greed,
            SourceKey::EtfFlows => self.etf_flows,
            SourceKey::OnchainBtc => self.onchain_btc,
            SourceKey::Miners => self.miners,
            SourceKey::StablecoinSupply => self.stablecoin_supply,
            SourceKey::MstrMnav => self.mstr_mnav,
        }
    }
}

/// Upstream fetch seam; the engine wires the real collectors behind it and
/// tests wire fixtures
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, key: &SourceKey) -> anyhow::Result<SourceValue>;
}

struct CacheEntry {
    value: SourceValue,
    fetched_at: Instant,
}

#[derive(Clone)]
enum FetchOutcome {
    Value(SourceValue),
    Failed,
}

pub struct MarketCache<F: Fetcher> {
    fetcher: Arc<F>,
    ttls: TtlTable,
    fetch_timeout: Duration,
    entries: RwLock<HashMap<SourceKey, CacheEntry>>,
    inflight: Mutex<HashMap<SourceKey, broadcast::Sender<FetchOutcome>>>,
}

impl<F: Fetcher> MarketCache<F> {
    pub fn new(fetcher: Arc<F>, ttls: TtlTable, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            ttls,
            fetch_timeout,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Look up one key, refreshing through the single-flight path when the
    /// TTL has elapsed
    pub async fn get(&self, key: SourceKey) -> Availability<SourceValue> {
        let ttl = self.ttls.ttl(&key);
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key) {
                if entry.fetched_at.elapsed() <= ttl {
                    return Availability::Fresh(entry.value.clone());
                }
            }
        }

        // Join an in-flight fetch for this key, or become its owner
        let waiter = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(&key) {
                Some(sender) => Some(sender.subscribe()),
                None => {
                    let (sender, _) = broadcast::channel(1);
                    inflight.insert(key.clone(), sender);
                    None
                }
            }
        };

        let outcome = match waiter {
            Some(mut receiver) => receiver.recv().await.unwrap_or(FetchOutcome::Failed),
            None => self.refresh(&key).await,
        };

        match outcome {
            FetchOutcome::Value(value) => Availability::Fresh(value),
            FetchOutcome::Failed => {
                let entries = self.entries.read().await;
                match entries.get(&key) {
                    Some(entry) => {
                        Availability::Stale(entry.value.clone(), entry.fetched_at.elapsed())
                    }
                    None => Availability::Absent,
                }
            }
        }
    }

    /// Look up a set of keys; distinct keys fetch concurrently
    pub async fn get_all(
        &self,
        keys: Vec<SourceKey>,
    ) -> HashMap<SourceKey, Availability<SourceValue>> {
        let lookups = keys.into_iter().map(|key| async move {
            let value = self.get(key.clone()).await;
            (key, value)
        });
        futures::future::join_all(lookups).await.into_iter().collect()
    }

    async fn refresh(&self, key: &SourceKey) -> FetchOutcome {
        // Another caller may have refreshed between our TTL check and
        // taking ownership of the flight
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.fetched_at.elapsed() <= self.ttls.ttl(key) {
                    let value = entry.value.clone();
                    drop(entries);
                    if let Some(sender) = self.inflight.lock().await.remove(key) {
                        let _ = sender.send(FetchOutcome::Value(value.clone()));
                    }
                    return FetchOutcome::Value(value);
                }
            }
        }

        let fetched =
            tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(key)).await;
        let outcome = match fetched {
            Ok(Ok(value)) => {
                self.entries.write().await.insert(
                    key.clone(),
                    CacheEntry {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                debug!(key = %key.label(), "cache refreshed");
                FetchOutcome::Value(value)
            }
            Ok(Err(err)) => {
                warn!(key = %key.label(), error = %err, "upstream fetch failed");
                FetchOutcome::Failed
            }
            Err(_) => {
                warn!(key = %key.label(), timeout = ?self.fetch_timeout, "upstream fetch timed out");
                FetchOutcome::Failed
            }
        };

        if let Some(sender) = self.inflight.lock().await.remove(key) {
            let _ = sender.send(outcome.clone());
        }
        outcome
    }
}
