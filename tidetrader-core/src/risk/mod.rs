//! Pre-trade risk filter
//!
//! Stateless per decision: every proposed order is checked against the
//! account snapshot in a fixed order (circuit breaker, per-trade notional
//! cap, per-symbol exposure cap, drawdown). A hard-drawdown veto also asks
//! the caller to trip the circuit breaker, which stays set until an admin
//! clears it.

use crate::broker::{AccountSnapshot, Order, Side};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Max order notional as a percentage of equity
    pub max_trade_notional_pct: f64,
    /// Max post-trade position value as a percentage of equity (BUY only)
    pub max_symbol_exposure_pct: f64,
    /// Drawdown at which new BUYs are vetoed
    pub soft_drawdown_pct: f64,
    /// Drawdown at which everything is vetoed and the breaker trips
    pub hard_drawdown_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_trade_notional_pct: 5.0,
            max_symbol_exposure_pct: 25.0,
            soft_drawdown_pct: 10.0,
            hard_drawdown_pct: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoReason {
    CircuitBreaker,
    TradeCap,
    ExposureCap,
    DrawdownHard,
    DrawdownSoft,
}

impl VetoReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VetoReason::CircuitBreaker => "circuit_breaker",
            VetoReason::TradeCap => "trade_cap",
            VetoReason::ExposureCap => "exposure_cap",
            VetoReason::DrawdownHard => "drawdown_hard",
            VetoReason::DrawdownSoft => "drawdown_soft",
        }
    }
}

impl fmt::Display for VetoReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskVerdict {
    Accept,
    Veto {
        reason: VetoReason,
        /// Caller must set the account circuit breaker before recording the veto
        trip_circuit_breaker: bool,
    },
}

impl RiskVerdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, RiskVerdict::Accept)
    }

    fn veto(reason: VetoReason) -> Self {
        RiskVerdict::Veto {
            reason,
            trip_circuit_breaker: false,
        }
    }
}

/// Assess a proposed order. `notional` is the order value at the latest
/// market price; the snapshot carries equity, high-water mark, breaker
/// state and per-symbol exposures.
pub fn assess(
    order: &Order,
    notional: f64,
    snapshot: &AccountSnapshot,
    config: &RiskConfig,
) -> RiskVerdict {
    if snapshot.circuit_breaker_active {
        return RiskVerdict::veto(VetoReason::CircuitBreaker);
    }

    let equity = snapshot.equity;
    if equity > 0.0 && notional > equity * config.max_trade_notional_pct / 100.0 {
        return RiskVerdict::veto(VetoReason::TradeCap);
    }

    if order.side == Side::Buy && equity > 0.0 {
        let exposure_after = snapshot.exposure(&order.symbol) + notional;
        if exposure_after / equity > config.max_symbol_exposure_pct / 100.0 {
            return RiskVerdict::veto(VetoReason::ExposureCap);
        }
    }

    let drawdown_pct = snapshot.drawdown() * 100.0;
    if drawdown_pct >= config.hard_drawdown_pct {
        return RiskVerdict::Veto {
            reason: VetoReason::DrawdownHard,
            trip_circuit_breaker: true,
        };
    }
    if drawdown_pct >= config.soft_drawdown_pct && order.side == Side::Buy {
        return RiskVerdict::veto(VetoReason::DrawdownSoft);
    }

    RiskVerdict::Accept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{OrderSize, PositionView};

    fn order(side: Side, notional: f64) -> Order {
        Order {
            strategy_id: 1,
            symbol: "BTC".into(),
            side,
            size: OrderSize::Notional(notional),
            reason: "test".into(),
        }
    }

    fn snapshot(equity: f64, hwm: f64, btc_value: f64, breaker: bool) -> AccountSnapshot {
        AccountSnapshot {
            cash: equity - btc_value,
            equity,
            equity_high_water_mark: hwm,
            circuit_breaker_active: breaker,
            circuit_breaker_reason: breaker.then(|| "drawdown_hard".to_string()),
            positions: if btc_value > 0.0 {
                vec![PositionView {
                    symbol: "BTC".into(),
                    amount: btc_value / 50_000.0,
                    average_cost: 50_000.0,
                    last_price: Some(50_000.0),
                    value: btc_value,
                }]
            } else {
                vec![]
            },
        }
    }

    #[test]
    fn test_breaker_vetoes_everything_first() {
        let snap = snapshot(10_000.0, 10_000.0, 0.0, true);
        let cfg = RiskConfig::default();
        for side in [Side::Buy, Side::Sell] {
            assert_eq!(
                assess(&order(side, 100.0), 100.0, &snap, &cfg),
                RiskVerdict::veto(VetoReason::CircuitBreaker)
            );
        }
    }

    #[test]
    fn test_trade_cap() {
        let snap = snapshot(10_000.0, 10_000.0, 0.0, false);
        let cfg = RiskConfig::default();
        // 5% of 10k = 500
        assert_eq!(
            assess(&order(Side::Buy, 600.0), 600.0, &snap, &cfg),
            RiskVerdict::veto(VetoReason::TradeCap)
        );
        assert!(assess(&order(Side::Buy, 400.0), 400.0, &snap, &cfg).is_accept());
    }

    #[test]
    fn test_exposure_cap_scenario() {
        // Equity 10k, BTC worth 2k (20%); an 800 BUY would reach 28% > 25%
        let snap = snapshot(10_000.0, 10_000.0, 2_000.0, false);
        let cfg = RiskConfig {
            max_trade_notional_pct: 100.0,
            ..RiskConfig::default()
        };
        assert_eq!(
            assess(&order(Side::Buy, 800.0), 800.0, &snap, &cfg),
            RiskVerdict::veto(VetoReason::ExposureCap)
        );
        // A SELL of the same notional passes the exposure check
        assert!(assess(&order(Side::Sell, 800.0), 800.0, &snap, &cfg).is_accept());
    }

    #[test]
    fn test_hard_drawdown_trips_breaker() {
        // Equity 7900 against HWM 10000: 21% drawdown
        let snap = snapshot(7_900.0, 10_000.0, 0.0, false);
        let cfg = RiskConfig {
            max_trade_notional_pct: 100.0,
            ..RiskConfig::default()
        };
        let verdict = assess(&order(Side::Buy, 100.0), 100.0, &snap, &cfg);
        assert_eq!(
            verdict,
            RiskVerdict::Veto {
                reason: VetoReason::DrawdownHard,
                trip_circuit_breaker: true
            }
        );
        // SELLs trip it too: hard drawdown halts everything
        let verdict = assess(&order(Side::Sell, 100.0), 100.0, &snap, &cfg);
        assert!(matches!(
            verdict,
            RiskVerdict::Veto {
                reason: VetoReason::DrawdownHard,
                ..
            }
        ));
    }

    #[test]
    fn test_soft_drawdown_blocks_buys_only() {
        // Equity 8900 against HWM 10000: 11% drawdown
        let snap = snapshot(8_900.0, 10_000.0, 0.0, false);
        let cfg = RiskConfig {
            max_trade_notional_pct: 100.0,
            ..RiskConfig::default()
        };
        assert_eq!(
            assess(&order(Side::Buy, 100.0), 100.0, &snap, &cfg),
            RiskVerdict::veto(VetoReason::DrawdownSoft)
        );
        assert!(assess(&order(Side::Sell, 100.0), 100.0, &snap, &cfg).is_accept());
    }
}
