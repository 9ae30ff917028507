//! Upstream data plumbing: collectors, the TTL cache and the kline store

pub mod cache;
pub mod collectors;
pub mod kline_sync;
pub mod market_data;

pub use cache::{Fetcher, MarketCache, SourceKey, SourceValue, TtlTable};
pub use kline_sync::KlineStore;
pub use market_data::EngineMarketData;
