//! Grid evaluator
//!
//! Precomputes log-spaced price levels between the configured bounds and
//! tracks which level the price last crossed. Downward crosses buy one
//! grid's capital, upward crosses sell the oldest open lot. Runtime state
//! (levels, level index, FIFO lots) lives in the strategy's parameter blob
//! and is committed by the scheduler only after the order actually fills.

use super::{
    Decision, EvalContext, EvalError, Evaluation, Evaluator, GridParams, GridState, SignalAction,
    StepKind, StrategyKind, StrategySpec, Trace,
};
use crate::broker::{Side, TradeFill};
use async_trait::async_trait;
use serde_json::json;
use std::time::Instant;

pub const REASON_CROSS_DOWN: &str = "grid_cross_down";
pub const REASON_CROSS_UP: &str = "grid_cross_up";
pub const PAUSE_OUT_OF_RANGE: &str = "grid_out_of_range";

const CROSS_CONVICTION: f64 = 80.0;

pub struct GridEvaluator;

#[async_trait]
impl Evaluator for GridEvaluator {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Grid
    }

    async fn evaluate(
        &self,
        spec: &StrategySpec,
        ctx: &EvalContext<'_>,
    ) -> Result<Evaluation, EvalError> {
        let mut params: GridParams = serde_json::from_value(spec.parameters.clone())?;
        params.validate().map_err(EvalError::BadParams)?;

        let mut trace = Trace::new();

        let started = Instant::now();
        let ticker = ctx.market.ticker(&spec.symbol).await;
        trace.record(
            StepKind::Fetch,
            "ticker",
            &spec.symbol,
            &ticker.value().map(|t| t.price),
            json!({"availability": ticker.marker()}),
            started,
        );
        let price = match ticker.value() {
            Some(t) if t.price > 0.0 => t.price,
            _ => {
                return Ok(Evaluation::new(
                    Decision::hold("no market price for the grid symbol"),
                    trace,
                ))
            }
        };

        // First evaluation seeds the state at the level nearest to price
        let state = match params.state.take() {
            Some(state) if state.levels.len() == params.grid_count + 1 => state,
            _ => {
                let state = seed_state(&params, price);
                let started = Instant::now();
                trace.record(
                    StepKind::Compute,
                    "grid_seed",
                    &price,
                    &state.level_index,
                    json!({"levels": state.levels.clone()}),
                    started,
                );
                params.state = Some(state);
                let blob = serde_json::to_value(&params)?;
                let mut eval =
                    Evaluation::new(Decision::hold("grid levels initialized"), trace);
                eval.params_update = Some(blob);
                return Ok(eval);
            }
        };

        // Out of range: no orders until the admin resets the bounds
        if price < params.lower_price || price > params.upper_price {
            let started = Instant::now();
            trace.record(
                StepKind::Score,
                "grid_range",
                &price,
                &PAUSE_OUT_OF_RANGE,
                json!({"lower": params.lower_price, "upper": params.upper_price}),
                started,
            );
            let mut eval = Evaluation::new(
                Decision::hold("price left the configured grid range"),
                trace,
            );
            eval.pause = Some(PAUSE_OUT_OF_RANGE.to_string());
            return Ok(eval);
        }

        let started = Instant::now();
        let cross = detect_cross(&state, price);
        trace.record(
            StepKind::Compute,
            "grid_cross",
            &(price, state.level_index),
            &cross,
            json!({"lots_open": state.lots.len()}),
            started,
        );

        let mut next = state.clone();
        let (decision, update) = match cross {
            Cross::Down(level) => {
                next.level_index = level;
                // Placeholder lot at the quoted price; the scheduler swaps
                // in the slippage-adjusted fill amount before committing
                next.lots.push(params.capital_per_grid / price);
                (
                    Decision {
                        action: SignalAction::Buy,
                        conviction: CROSS_CONVICTION,
                        suggested_notional: params.capital_per_grid,
                        suggested_amount: None,
                        stop_loss: None,
                        take_profit: None,
                        reason: REASON_CROSS_DOWN.to_string(),
                    },
                    true,
                )
            }
            Cross::Up(level) => {
                next.level_index = level;
                if next.lots.is_empty() {
                    // Nothing bought below; just track the new level
                    (Decision::hold("upward cross with no open lot"), true)
                } else {
                    let lot = next.lots.remove(0);
                    (
                        Decision {
                            action: SignalAction::Sell,
                            conviction: CROSS_CONVICTION,
                            suggested_notional: lot * price,
                            suggested_amount: Some(lot),
                            stop_loss: None,
                            take_profit: None,
                            reason: REASON_CROSS_UP.to_string(),
                        },
                        true,
                    )
                }
            }
            Cross::None => (Decision::hold("price inside the current grid cell"), false),
        };

        let started = Instant::now();
        trace.record(
            StepKind::Score,
            "grid_decision",
            &price,
            &decision.action.as_str(),
            json!({
                "level_index": next.level_index,
                "conviction": decision.conviction,
            }),
            started,
        );

        params.state = Some(if update { next } else { state });
        let mut eval = Evaluation::new(decision, trace);
        if update {
            eval.params_update = Some(serde_json::to_value(&params)?);
        }
        Ok(eval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
enum Cross {
    Down(usize),
    Up(usize),
    None,
}

/// `grid_count + 1` levels equally spaced in log-space, plus the index of
/// the level closest to the first observed price
fn seed_state(params: &GridParams, price: f64) -> GridState {
    let count = params.grid_count as f64;
    let ratio = params.upper_price / params.lower_price;
    let levels: Vec<f64> = (0..=params.grid_count)
        .map(|i| params.lower_price * ratio.powf(i as f64 / count))
        .collect();

    let level_index = levels
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - price)
                .abs()
                .partial_cmp(&(*b - price).abs())
                .expect("grid levels are finite")
        })
        .map(|(i, _)| i)
        .unwrap_or(0);

    GridState {
        levels,
        level_index,
        lots: Vec::new(),
    }
}

/// Align a pending grid state update with what the broker actually
/// filled. The evaluator records a BUY lot at the quoted price, but the
/// fill carries slippage, so the position holds slightly less than the
/// quote implies; a later upward cross must sell the held amount exactly
/// or the broker rejects it. SELLs need no fix-up (the lot was removed
/// before the order went out).
pub fn reconcile_lot_with_fill(parameters: &mut serde_json::Value, fill: &TradeFill) {
    if fill.side != Side::Buy {
        return;
    }
    let Ok(mut params) = serde_json::from_value::<GridParams>(parameters.clone()) else {
        return;
    };
    let Some(last) = params.state.as_mut().and_then(|s| s.lots.last_mut()) else {
        return;
    };
    *last = fill.amount;
    if let Ok(blob) = serde_json::to_value(&params) {
        *parameters = blob;
    }
}

/// A downward cross lands on the lowest level above the price that sits
/// strictly below the tracked level; an upward cross is symmetric.
fn detect_cross(state: &GridState, price: f64) -> Cross {
    let crossed_down = (0..state.level_index)
        .filter(|&i| price < state.levels[i])
        .min();
    if let Some(level) = crossed_down {
        return Cross::Down(level);
    }

    let crossed_up = (state.level_index + 1..state.levels.len())
        .filter(|&i| price > state.levels[i])
        .max();
    if let Some(level) = crossed_up {
        return Cross::Up(level);
    }

    Cross::None
}
