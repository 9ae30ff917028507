//! The virtual account: cash, positions, ledger arithmetic

use super::{BrokerError, FeeSchedule, Order, OrderSize, Side, TradeFill};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position amounts below this are treated as fully closed
const DUST_AMOUNT: f64 = 1e-12;

/// One open position per symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLot {
    pub amount: f64,
    pub average_cost: f64,
    pub opened_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

/// Read-only view of one position, priced against the latest market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionView {
    pub symbol: String,
    pub amount: f64,
    pub average_cost: f64,
    pub last_price: Option<f64>,
    /// amount × last price, falling back to average cost
    pub value: f64,
}

/// Point-in-time account view handed to evaluators and the risk filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub cash: f64,
    pub equity: f64,
    pub equity_high_water_mark: f64,
    pub circuit_breaker_active: bool,
    pub circuit_breaker_reason: Option<String>,
    pub positions: Vec<PositionView>,
}

impl AccountSnapshot {
    pub fn position(&self, symbol: &str) -> Option<&PositionView> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// Market value currently allocated to a symbol
    pub fn exposure(&self, symbol: &str) -> f64 {
        self.position(symbol).map(|p| p.value).unwrap_or(0.0)
    }

    /// 1 - equity / high-water mark, floored at zero
    pub fn drawdown(&self) -> f64 {
        if self.equity_high_water_mark > 0.0 {
            (1.0 - self.equity / self.equity_high_water_mark).max(0.0)
        } else {
            0.0
        }
    }
}

/// The virtual account book. The engine serializes all mutation behind a
/// single writer lock; this type only guarantees arithmetic invariants:
/// cash never goes negative, a position's amount never goes negative, and
/// zero-amount positions are removed.
#[derive(Debug, Clone)]
pub struct AccountBook {
    cash: f64,
    equity_high_water_mark: f64,
    circuit_breaker_reason: Option<String>,
    positions: BTreeMap<String, PositionLot>,
}

impl AccountBook {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            equity_high_water_mark: initial_cash,
            circuit_breaker_reason: None,
            positions: BTreeMap::new(),
        }
    }

    /// Rebuild a book from persisted state
    pub fn restore(
        cash: f64,
        equity_high_water_mark: f64,
        circuit_breaker_reason: Option<String>,
        positions: BTreeMap<String, PositionLot>,
    ) -> Self {
        Self {
            cash,
            equity_high_water_mark,
            circuit_breaker_reason,
            positions,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn equity_high_water_mark(&self) -> f64 {
        self.equity_high_water_mark
    }

    pub fn circuit_breaker_active(&self) -> bool {
        self.circuit_breaker_reason.is_some()
    }

    pub fn circuit_breaker_reason(&self) -> Option<&str> {
        self.circuit_breaker_reason.as_deref()
    }

    pub fn position(&self, symbol: &str) -> Option<&PositionLot> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&String, &PositionLot)> {
        self.positions.iter()
    }

    /// cash + Σ amount × last price; symbols without a quote contribute at
    /// average cost
    pub fn equity(&self, price_of: impl Fn(&str) -> Option<f64>) -> f64 {
        let held: f64 = self
            .positions
            .iter()
            .map(|(symbol, lot)| lot.amount * price_of(symbol).unwrap_or(lot.average_cost))
            .sum();
        self.cash + held
    }

    /// Snapshot against the given price source
    pub fn snapshot(&self, price_of: impl Fn(&str) -> Option<f64>) -> AccountSnapshot {
        let positions = self
            .positions
            .iter()
            .map(|(symbol, lot)| {
                let last_price = price_of(symbol);
                PositionView {
                    symbol: symbol.clone(),
                    amount: lot.amount,
                    average_cost: lot.average_cost,
                    last_price,
                    value: lot.amount * last_price.unwrap_or(lot.average_cost),
                }
            })
            .collect();
        AccountSnapshot {
            cash: self.cash,
            equity: self.equity(price_of),
            equity_high_water_mark: self.equity_high_water_mark,
            circuit_breaker_active: self.circuit_breaker_active(),
            circuit_breaker_reason: self.circuit_breaker_reason.clone(),
            positions,
        }
    }

    /// Execute an order against the last market price.
    ///
    /// BUY: amount = notional / execution price; requires value + fee ≤ cash.
    /// SELL: requires amount ≤ held; notional-sized sells clamp to the
    /// holding; average cost is never touched by a sell.
    pub fn execute(
        &mut self,
        order: &Order,
        last_price: f64,
        fees: &FeeSchedule,
        now: DateTime<Utc>,
    ) -> Result<TradeFill, BrokerError> {
        if last_price <= 0.0 {
            return Err(BrokerError::MissingPrice {
                symbol: order.symbol.clone(),
            });
        }

        let exec_price = fees.execution_price(last_price, order.side);
        match order.side {
            Side::Buy => self.apply_buy(order, exec_price, fees, now),
            Side::Sell => self.apply_sell(order, exec_price, fees, now),
        }
    }

    fn apply_buy(
        &mut self,
        order: &Order,
        exec_price: f64,
        fees: &FeeSchedule,
        now: DateTime<Utc>,
    ) -> Result<TradeFill, BrokerError> {
        let notional = match order.size {
            OrderSize::Notional(n) => n,
            OrderSize::Amount(a) => a * exec_price,
        };
        if notional <= 0.0 {
            return Err(BrokerError::EmptyOrder);
        }

        let amount = notional / exec_price;
        let value = amount * exec_price;
        let fee = fees.fee_on(value);
        let cost = value + fee;
        if cost > self.cash {
            return Err(BrokerError::InsufficientCash {
                needed: cost,
                cash: self.cash,
            });
        }

        self.cash -= cost;
        let lot = self.positions.entry(order.symbol.clone()).or_insert(PositionLot {
            amount: 0.0,
            average_cost: 0.0,
            opened_at: now,
            last_updated_at: now,
        });
        let total_cost = lot.amount * lot.average_cost + amount * exec_price;
        lot.amount += amount;
        lot.average_cost = total_cost / lot.amount;
        lot.last_updated_at = now;

        Ok(self.fill(order, exec_price, amount, value, fee, now))
    }

    fn apply_sell(
        &mut self,
        order: &Order,
        exec_price: f64,
        fees: &FeeSchedule,
        now: DateTime<Utc>,
    ) -> Result<TradeFill, BrokerError> {
        let held = self.positions.get(&order.symbol).map(|l| l.amount).unwrap_or(0.0);
        let amount = match order.size {
            OrderSize::Amount(a) => {
                if a > held + DUST_AMOUNT {
                    return Err(BrokerError::InsufficientHolding {
                        symbol: order.symbol.clone(),
                        wanted: a,
                        held,
                    });
                }
                a.min(held)
            }
            // Notional-sized sells close at most the full holding
            OrderSize::Notional(n) => (n / exec_price).min(held),
        };
        if amount <= 0.0 {
            return Err(if held <= 0.0 {
                BrokerError::InsufficientHolding {
                    symbol: order.symbol.clone(),
                    wanted: order.notional_at(exec_price) / exec_price,
                    held,
                }
            } else {
                BrokerError::EmptyOrder
            });
        }

        let value = amount * exec_price;
        let fee = fees.fee_on(value);
        self.cash += value - fee;

        let remove = {
            let lot = self
                .positions
                .get_mut(&order.symbol)
                .expect("holding checked above");
            lot.amount -= amount;
            lot.last_updated_at = now;
            lot.amount <= DUST_AMOUNT
        };
        if remove {
            self.positions.remove(&order.symbol);
        }

        Ok(self.fill(order, exec_price, amount, value, fee, now))
    }

    fn fill(
        &self,
        order: &Order,
        price: f64,
        amount: f64,
        value: f64,
        fee: f64,
        now: DateTime<Utc>,
    ) -> TradeFill {
        TradeFill {
            strategy_id: order.strategy_id,
            symbol: order.symbol.clone(),
            side: order.side,
            price,
            amount,
            value,
            fee,
            reason: order.reason.clone(),
            executed_at: now,
        }
    }

    /// Raise the high-water mark if current equity exceeds it
    pub fn update_high_water_mark(&mut self, equity: f64) {
        if equity > self.equity_high_water_mark {
            self.equity_high_water_mark = equity;
        }
    }

    pub fn set_circuit_breaker(&mut self, reason: impl Into<String>) {
        self.circuit_breaker_reason = Some(reason.into());
    }

    /// Cleared only by an explicit admin action
    pub fn clear_circuit_breaker(&mut self) {
        self.circuit_breaker_reason = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: Side, size: OrderSize) -> Order {
        Order {
            strategy_id: 1,
            symbol: "BTC".into(),
            side,
            size,
            reason: "test".into(),
        }
    }

    fn fees() -> FeeSchedule {
        FeeSchedule {
            fee_bps: 10.0,
            slippage_bps: 5.0,
        }
    }

    #[test]
    fn test_buy_cash_law() {
        // cash_after == cash_before - price*amount*(1 + fee_bps/10^4)
        let mut book = AccountBook::new(10_000.0);
        let fill = book
            .execute(
                &order(Side::Buy, OrderSize::Notional(1_000.0)),
                50_000.0,
                &fees(),
                Utc::now(),
            )
            .unwrap();

        let expected_cash = 10_000.0 - fill.price * fill.amount * (1.0 + 10.0 / 10_000.0);
        assert!((book.cash() - expected_cash).abs() < 1e-9);
        assert!((fill.price - 50_000.0 * 1.0005).abs() < 1e-6);
        assert!((fill.value - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_buy_average_cost_is_weighted() {
        let mut book = AccountBook::new(100_000.0);
        let f = fees();
        book.execute(
            &order(Side::Buy, OrderSize::Notional(10_000.0)),
            50_000.0,
            &f,
            Utc::now(),
        )
        .unwrap();
        let first = book.position("BTC").unwrap().clone();

        book.execute(
            &order(Side::Buy, OrderSize::Notional(10_000.0)),
            60_000.0,
            &f,
            Utc::now(),
        )
        .unwrap();
        let lot = book.position("BTC").unwrap();

        let second_amount = lot.amount - first.amount;
        let expected = (first.amount * first.average_cost
            + second_amount * 60_000.0 * 1.0005)
            / lot.amount;
        assert!((lot.average_cost - expected).abs() < 1e-6);
    }

    #[test]
    fn test_sell_cash_law_and_cost_preserved() {
        let mut book = AccountBook::new(10_000.0);
        let f = fees();
        book.execute(
            &order(Side::Buy, OrderSize::Notional(5_000.0)),
            50_000.0,
            &f,
            Utc::now(),
        )
        .unwrap();
        let cost_before = book.position("BTC").unwrap().average_cost;
        let cash_before = book.cash();

        let fill = book
            .execute(
                &order(Side::Sell, OrderSize::Amount(0.05)),
                52_000.0,
                &f,
                Utc::now(),
            )
            .unwrap();

        let expected_cash = cash_before + fill.price * fill.amount * (1.0 - 10.0 / 10_000.0);
        assert!((book.cash() - expected_cash).abs() < 1e-9);
        assert_eq!(book.position("BTC").unwrap().average_cost, cost_before);
    }

    #[test]
    fn test_full_close_removes_position() {
        let mut book = AccountBook::new(10_000.0);
        let f = fees();
        book.execute(
            &order(Side::Buy, OrderSize::Notional(1_000.0)),
            50_000.0,
            &f,
            Utc::now(),
        )
        .unwrap();
        let amount = book.position("BTC").unwrap().amount;

        book.execute(
            &order(Side::Sell, OrderSize::Amount(amount)),
            50_000.0,
            &f,
            Utc::now(),
        )
        .unwrap();
        assert!(book.position("BTC").is_none());
    }

    #[test]
    fn test_insufficient_cash() {
        let mut book = AccountBook::new(100.0);
        let err = book
            .execute(
                &order(Side::Buy, OrderSize::Notional(1_000.0)),
                50_000.0,
                &fees(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, BrokerError::InsufficientCash { .. }));
        assert_eq!(book.cash(), 100.0);
    }

    #[test]
    fn test_oversell_is_rejected() {
        let mut book = AccountBook::new(10_000.0);
        let f = fees();
        book.execute(
            &order(Side::Buy, OrderSize::Notional(1_000.0)),
            50_000.0,
            &f,
            Utc::now(),
        )
        .unwrap();

        let err = book
            .execute(
                &order(Side::Sell, OrderSize::Amount(1.0)),
                50_000.0,
                &f,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, BrokerError::InsufficientHolding { .. }));
    }

    #[test]
    fn test_equity_falls_back_to_average_cost() {
        let mut book = AccountBook::new(10_000.0);
        let f = fees();
        book.execute(
            &order(Side::Buy, OrderSize::Notional(1_000.0)),
            50_000.0,
            &f,
            Utc::now(),
        )
        .unwrap();

        let with_quote = book.equity(|_| Some(50_000.0 * 1.0005));
        let without_quote = book.equity(|_| None);
        assert!((with_quote - without_quote).abs() < 1e-9);
    }

    #[test]
    fn test_high_water_mark_only_rises() {
        let mut book = AccountBook::new(10_000.0);
        book.update_high_water_mark(12_000.0);
        assert_eq!(book.equity_high_water_mark(), 12_000.0);
        book.update_high_water_mark(9_000.0);
        assert_eq!(book.equity_high_water_mark(), 12_000.0);
    }
}
