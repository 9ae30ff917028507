//! Technical indicators module
//!
//! Series-oriented wrappers over the `ta` crate plus the analyses it does
//! not cover (StochRSI, volume profile, trend structure, candle patterns).
//! All functions take bars oldest-first and mask warm-up outputs as `None`;
//! inputs shorter than the warm-up fail with
//! [`IndicatorError::InsufficientData`], which callers treat as a neutral
//! contribution rather than a run failure.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod patterns;
pub mod rsi;
pub mod stoch_rsi;
pub mod structure;
pub mod volume;

pub use atr::*;
pub use bollinger::*;
pub use ema::*;
pub use macd::*;
pub use patterns::*;
pub use rsi::*;
pub use stoch_rsi::*;
pub use structure::*;
pub use volume::*;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndicatorError {
    #[error("insufficient data: need at least {required} bars, got {got}")]
    InsufficientData { required: usize, got: usize },
}

pub(crate) fn require(got: usize, required: usize) -> Result<(), IndicatorError> {
    if got < required {
        Err(IndicatorError::InsufficientData { required, got })
    } else {
        Ok(())
    }
}

/// Last defined value of an indicator series
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.iter().rev().flatten().next().copied()
}
