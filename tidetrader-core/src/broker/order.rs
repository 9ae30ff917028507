//! Orders, fills and fee configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown side: {}", other)),
        }
    }
}

/// Order size, either in quote currency or in base units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSize {
    Notional(f64),
    Amount(f64),
}

/// Proposed order, produced by the scheduler from a decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub strategy_id: i64,
    pub symbol: String,
    pub side: Side,
    pub size: OrderSize,
    pub reason: String,
}

impl Order {
    /// Order value in quote currency at the given reference price
    pub fn notional_at(&self, price: f64) -> f64 {
        match self.size {
            OrderSize::Notional(n) => n,
            OrderSize::Amount(a) => a * price,
        }
    }
}

/// Fee and slippage applied to paper fills, both in basis points
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub fee_bps: f64,
    pub slippage_bps: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fee_bps: 10.0,
            slippage_bps: 5.0,
        }
    }
}

impl FeeSchedule {
    /// Execution price after slippage; buys pay up, sells receive less
    pub fn execution_price(&self, last_price: f64, side: Side) -> f64 {
        match side {
            Side::Buy => last_price * (1.0 + self.slippage_bps / 10_000.0),
            Side::Sell => last_price * (1.0 - self.slippage_bps / 10_000.0),
        }
    }

    /// Fee charged on a trade value
    pub fn fee_on(&self, value: f64) -> f64 {
        value * self.fee_bps / 10_000.0
    }
}

/// Executed paper trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeFill {
    pub strategy_id: i64,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub amount: f64,
    pub value: f64,
    pub fee: f64,
    pub reason: String,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BrokerError {
    #[error("insufficient cash: need {needed:.2}, have {cash:.2}")]
    InsufficientCash { needed: f64, cash: f64 },
    #[error("insufficient holding: want {wanted:.8} {symbol}, have {held:.8}")]
    InsufficientHolding {
        symbol: String,
        wanted: f64,
        held: f64,
    },
    #[error("no market price for {symbol}")]
    MissingPrice { symbol: String },
    #[error("order has non-positive size")]
    EmptyOrder,
}
