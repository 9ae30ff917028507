//! Strategy evaluator contract
//!
//! An evaluator turns a strategy definition plus a read-only market/account
//! context into a [`Decision`] and an execution [`Trace`]. Evaluators never
//! place orders; the scheduler owns order translation, risk filtering and
//! broker calls.

pub mod context;
pub mod grid;
pub mod macro_trend;
pub mod params;
pub mod ta;
pub mod trace;

pub use context::*;
pub use grid::{reconcile_lot_with_fill, GridEvaluator};
pub use macro_trend::MacroEvaluator;
pub use params::*;
pub use ta::TaEvaluator;
pub use trace::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Strategy flavor; decides which evaluator runs and how the parameter
/// blob is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyKind {
    Ta,
    Macro,
    Grid,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Ta => "TA",
            StrategyKind::Macro => "MACRO",
            StrategyKind::Grid => "GRID",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TA" => Ok(StrategyKind::Ta),
            "MACRO" => Ok(StrategyKind::Macro),
            "GRID" => Ok(StrategyKind::Grid),
            other => Err(format!("unknown strategy kind: {}", other)),
        }
    }
}

/// Lifecycle state, owned by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyStatus {
    Active,
    Paused,
    Stopped,
    Error,
}

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Active => "ACTIVE",
            StrategyStatus::Paused => "PAUSED",
            StrategyStatus::Stopped => "STOPPED",
            StrategyStatus::Error => "ERROR",
        }
    }
}

impl FromStr for StrategyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(StrategyStatus::Active),
            "PAUSED" => Ok(StrategyStatus::Paused),
            "STOPPED" => Ok(StrategyStatus::Stopped),
            "ERROR" => Ok(StrategyStatus::Error),
            other => Err(format!("unknown strategy status: {}", other)),
        }
    }
}

/// Decision action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Hold => "HOLD",
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(SignalAction::Buy),
            "SELL" => Ok(SignalAction::Sell),
            "HOLD" => Ok(SignalAction::Hold),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

/// Run outcome recorded on the run log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunOutcome {
    Ok,
    Vetoed,
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Ok => "OK",
            RunOutcome::Vetoed => "VETOED",
            RunOutcome::Failed => "FAILED",
        }
    }
}

impl FromStr for RunOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(RunOutcome::Ok),
            "VETOED" => Ok(RunOutcome::Vetoed),
            "FAILED" => Ok(RunOutcome::Failed),
            other => Err(format!("unknown run outcome: {}", other)),
        }
    }
}

/// The strategy definition handed to an evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySpec {
    pub id: i64,
    pub name: String,
    pub kind: StrategyKind,
    pub symbol: String,
    /// Kind-specific parameters; shape defined by [`params`]
    pub parameters: serde_json::Value,
}

/// Evaluator output before risk filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: SignalAction,
    /// 0..100
    pub conviction: f64,
    /// Suggested order value in quote currency; 0 on HOLD
    pub suggested_notional: f64,
    /// Exact base amount when the strategy sizes in units (grid lots)
    pub suggested_amount: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reason: String,
}

impl Decision {
    pub fn hold(reason: impl Into<String>) -> Self {
        Self {
            action: SignalAction::Hold,
            conviction: 50.0,
            suggested_notional: 0.0,
            suggested_amount: None,
            stop_loss: None,
            take_profit: None,
            reason: reason.into(),
        }
    }
}

/// Full evaluation result
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    pub trace: Trace,
    /// Replacement parameter blob; the scheduler persists it (order-emitting
    /// updates only after the order actually executed)
    pub params_update: Option<serde_json::Value>,
    /// Evaluator asks the scheduler to pause the strategy (reason code)
    pub pause: Option<String>,
}

impl Evaluation {
    pub fn new(decision: Decision, trace: Trace) -> Self {
        Self {
            decision,
            trace,
            params_update: None,
            pause: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid parameters: {0}")]
    BadParams(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("evaluation failed: {0}")]
    Internal(#[from] anyhow::Error),
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn evaluate(
        &self,
        spec: &StrategySpec,
        ctx: &EvalContext<'_>,
    ) -> Result<Evaluation, EvalError>;
}
