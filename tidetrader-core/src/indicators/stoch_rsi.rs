//! Stochastic RSI

use super::{require, rsi, IndicatorError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochRsi {
    /// %K, 0..100
    pub k: f64,
    /// %D, the smoothed %K
    pub d: f64,
}

/// RSI normalized over its own `period`-bar range, then smoothed:
/// %K = SMA(k_smooth) of the raw stochastic, %D = SMA(d_smooth) of %K.
pub fn stoch_rsi(
    closes: &[f64],
    period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> Result<StochRsi, IndicatorError> {
    require(closes.len(), 2 * period + k_smooth + d_smooth)?;

    let rsi_series: Vec<f64> = rsi(closes, period)?.into_iter().flatten().collect();

    let mut raw = Vec::with_capacity(rsi_series.len());
    for i in (period - 1)..rsi_series.len() {
        let window = &rsi_series[i + 1 - period..=i];
        let min = window.iter().copied().fold(f64::INFINITY, f64::min);
        let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        raw.push(if range > 0.0 {
            (rsi_series[i] - min) / range * 100.0
        } else {
            50.0
        });
    }

    let k_series = rolling_mean(&raw, k_smooth);
    let d_series = rolling_mean(&k_series, d_smooth);

    Ok(StochRsi {
        k: *k_series.last().expect("warm-up checked above"),
        d: *d_series.last().expect("warm-up checked above"),
    })
}

fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = (i + 1).saturating_sub(window);
            let w = &values[start..=i];
            w.iter().sum::<f64>() / w.len() as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let closes: Vec<f64> = (0..80)
            .map(|i| 100.0 + (i as f64 * 0.4).sin() * 5.0)
            .collect();
        let s = stoch_rsi(&closes, 14, 3, 3).unwrap();
        assert!((0.0..=100.0).contains(&s.k));
        assert!((0.0..=100.0).contains(&s.d));
    }

    #[test]
    fn test_sustained_rally_saturates_k() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 2.0).collect();
        let s = stoch_rsi(&closes, 14, 3, 3).unwrap();
        assert!(s.k > 70.0, "k = {}", s.k);
    }

    #[test]
    fn test_warmup_fails() {
        assert!(stoch_rsi(&[1.0; 20], 14, 3, 3).is_err());
    }
}
