//! Per-kind strategy parameter records
//!
//! The stored form stays an opaque JSON blob so the schema survives
//! parameter additions; these records are the validated in-memory shape.

use super::{EvalError, StrategyKind};
use crate::data::Timeframe;
use serde::{Deserialize, Serialize};

/// Technical-indicator strategy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaParams {
    /// Ordered subset of {15m, 1h, 4h, 1d}
    pub timeframes: Vec<Timeframe>,
    pub klines_limit: usize,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub atr_stop_mult: f64,
    pub atr_target_mult: f64,
    /// Base position size as a percentage of equity
    pub base_size_pct: f64,
}

impl Default for TaParams {
    fn default() -> Self {
        Self {
            timeframes: vec![Timeframe::M15, Timeframe::H1, Timeframe::H4],
            klines_limit: 300,
            buy_threshold: 65.0,
            sell_threshold: 35.0,
            atr_stop_mult: 2.0,
            atr_target_mult: 3.0,
            base_size_pct: 10.0,
        }
    }
}

impl TaParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.timeframes.is_empty() {
            return Err("timeframes must not be empty".into());
        }
        let allowed = [Timeframe::M15, Timeframe::H1, Timeframe::H4, Timeframe::D1];
        if let Some(tf) = self.timeframes.iter().find(|tf| !allowed.contains(tf)).copied() {
            return Err(format!("timeframe {} not supported by the TA strategy", tf));
        }
        if self.sell_threshold >= self.buy_threshold {
            return Err("sell_threshold must be below buy_threshold".into());
        }
        Ok(())
    }
}

/// Macro-trend strategy parameters
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MacroParams {
    pub llm_enabled: bool,
}

/// Grid strategy parameters; `state` is evaluator-owned
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    pub lower_price: f64,
    pub upper_price: f64,
    pub grid_count: usize,
    /// Quote currency spent per downward grid cross
    pub capital_per_grid: f64,
    pub state: Option<GridState>,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            lower_price: 0.0,
            upper_price: 0.0,
            grid_count: 10,
            capital_per_grid: 0.0,
            state: None,
        }
    }
}

impl GridParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.lower_price <= 0.0 || self.upper_price <= self.lower_price {
            return Err("grid requires 0 < lower_price < upper_price".into());
        }
        if self.grid_count < 2 {
            return Err("grid_count must be at least 2".into());
        }
        if self.capital_per_grid <= 0.0 {
            return Err("capital_per_grid must be positive".into());
        }
        Ok(())
    }
}

/// Evaluator-owned grid runtime state, persisted in the parameters blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridState {
    /// grid_count + 1 price levels, log-spaced, ascending
    pub levels: Vec<f64>,
    /// Index of the level the price currently tracks
    pub level_index: usize,
    /// Open lot amounts in FIFO order, one per filled downward cross
    pub lots: Vec<f64>,
}

/// Parse and validate a parameter blob for a strategy kind. Used at
/// create/update time by the admin operations and by the evaluators.
pub fn validate_parameters(kind: StrategyKind, blob: &serde_json::Value) -> Result<(), EvalError> {
    match kind {
        StrategyKind::Ta => {
            let params: TaParams = serde_json::from_value(blob.clone())?;
            params.validate().map_err(EvalError::BadParams)
        }
        StrategyKind::Macro => {
            let _: MacroParams = serde_json::from_value(blob.clone())?;
            Ok(())
        }
        StrategyKind::Grid => {
            let params: GridParams = serde_json::from_value(blob.clone())?;
            params.validate().map_err(EvalError::BadParams)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ta_defaults_are_valid() {
        assert!(TaParams::default().validate().is_ok());
    }

    #[test]
    fn test_ta_rejects_empty_timeframes() {
        let params = TaParams {
            timeframes: vec![],
            ..TaParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_ta_rejects_fast_timeframes() {
        let params = TaParams {
            timeframes: vec![Timeframe::M1],
            ..TaParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_grid_validation() {
        assert!(validate_parameters(
            StrategyKind::Grid,
            &json!({
                "lower_price": 90000.0,
                "upper_price": 110000.0,
                "grid_count": 4,
                "capital_per_grid": 1000.0
            })
        )
        .is_ok());

        assert!(validate_parameters(
            StrategyKind::Grid,
            &json!({
                "lower_price": 110000.0,
                "upper_price": 90000.0,
                "grid_count": 4,
                "capital_per_grid": 1000.0
            })
        )
        .is_err());
    }

    #[test]
    fn test_blob_roundtrip_preserves_unknown_defaults() {
        let blob = json!({"timeframes": ["1h", "4h"]});
        let params: TaParams = serde_json::from_value(blob).unwrap();
        assert_eq!(params.klines_limit, 300);
        assert_eq!(params.timeframes, vec![Timeframe::H1, Timeframe::H4]);
    }
}
