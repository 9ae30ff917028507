//! Tidetrader-Core: the domain library of the tidetrader engine
//!
//! This crate holds everything that can be computed without touching the
//! network or the database:
//!
//! - **Data**: OHLCV bars, timeframes, typed upstream records and the
//!   `Fresh | Stale | Absent` availability wrapper
//! - **Indicators**: EMA/SMA, RSI, MACD, Bollinger, ATR, StochRSI, volume
//!   profile, trend structure, candle patterns
//! - **Broker**: the virtual account book with fee/slippage arithmetic
//! - **Risk**: the pre-trade order filter and circuit breaker rules
//! - **Strategy**: the evaluator contract plus the technical, macro-trend
//!   and grid evaluators
//!
//! The `engine` crate wires these against SQLite, the upstream collectors
//! and the scheduler.

pub mod data;
pub mod indicators;
pub mod broker;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::data::*;
    pub use crate::broker::*;
    pub use crate::risk::*;
    pub use crate::strategy::*;

    pub use anyhow::{Context, Result};
}
