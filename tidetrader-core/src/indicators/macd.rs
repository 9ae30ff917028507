//! MACD with golden/death cross detection

use super::{require, IndicatorError};
use serde::{Deserialize, Serialize};
use ta::indicators::MovingAverageConvergenceDivergence;
use ta::Next;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacdCross {
    Golden,
    Death,
    None,
}

/// MACD reading at the last bar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Macd {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
    /// Histogram one bar earlier, for momentum checks
    pub prev_histogram: f64,
    /// Cross at the last bar, from the sign of `macd - signal` at t vs t-1
    pub cross: MacdCross,
}

pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<Macd, IndicatorError> {
    require(closes.len(), slow + signal)?;

    let mut inner = MovingAverageConvergenceDivergence::new(fast, slow, signal)
        .map_err(|_| IndicatorError::InsufficientData { required: 1, got: 0 })?;

    let mut prev = None;
    let mut curr = None;
    for &c in closes {
        prev = curr;
        let out = inner.next(c);
        curr = Some(out);
    }

    // require() guarantees at least two updates
    let curr = curr.expect("macd requires input");
    let prev = prev.expect("macd requires at least two bars");

    let curr_diff = curr.macd - curr.signal;
    let prev_diff = prev.macd - prev.signal;
    let cross = if prev_diff <= 0.0 && curr_diff > 0.0 {
        MacdCross::Golden
    } else if prev_diff >= 0.0 && curr_diff < 0.0 {
        MacdCross::Death
    } else {
        MacdCross::None
    };

    Ok(Macd {
        macd_line: curr.macd,
        signal_line: curr.signal,
        histogram: curr.histogram,
        prev_histogram: prev.histogram,
        cross,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptrend_has_positive_macd() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 * (1.01f64).powi(i)).collect();
        let m = macd(&closes, 12, 26, 9).unwrap();
        assert!(m.macd_line > 0.0);
    }

    #[test]
    fn test_golden_cross_on_reversal() {
        // Long decline followed by a sharp rally drives macd back above signal
        let mut closes: Vec<f64> = (0..120).map(|i| 200.0 - i as f64).collect();
        closes.extend((0..25).map(|i| 80.0 + (i as f64) * 4.0));

        let mut seen_golden = false;
        for n in (26 + 9)..closes.len() {
            if macd(&closes[..n], 12, 26, 9).unwrap().cross == MacdCross::Golden {
                seen_golden = true;
                break;
            }
        }
        assert!(seen_golden);
    }

    #[test]
    fn test_warmup_fails() {
        assert!(macd(&[1.0; 20], 12, 26, 9).is_err());
    }
}
