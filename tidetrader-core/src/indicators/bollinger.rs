//! Bollinger Bands with %B and squeeze detection

use super::{require, IndicatorError};
use serde::{Deserialize, Serialize};
use ta::indicators::BollingerBands;
use ta::Next;

/// Number of trailing bandwidth readings examined for the squeeze
const SQUEEZE_LOOKBACK: usize = 20;
/// A bandwidth within 5% of its rolling minimum counts as compressed
const SQUEEZE_TOLERANCE: f64 = 1.05;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bollinger {
    pub mid: f64,
    pub upper: f64,
    pub lower: f64,
    /// (close - lower) / (upper - lower); outside [0, 1] when price escapes
    pub percent_b: f64,
    /// (upper - lower) / mid
    pub bandwidth: f64,
    /// Bandwidth sits at its rolling low
    pub squeeze: bool,
}

pub fn bollinger(closes: &[f64], period: usize, k: f64) -> Result<Bollinger, IndicatorError> {
    require(closes.len(), period)?;

    let mut inner = BollingerBands::new(period, k)
        .map_err(|_| IndicatorError::InsufficientData { required: 1, got: 0 })?;

    let mut bandwidths = Vec::with_capacity(closes.len());
    let mut last = None;
    for (i, &c) in closes.iter().enumerate() {
        let out = inner.next(c);
        if i + 1 >= period {
            let bw = if out.average > 0.0 {
                (out.upper - out.lower) / out.average
            } else {
                0.0
            };
            bandwidths.push(bw);
            last = Some(out);
        }
    }

    let out = last.expect("warm-up checked above");
    let close = *closes.last().expect("non-empty input");
    let band_range = out.upper - out.lower;
    let percent_b = if band_range > 0.0 {
        (close - out.lower) / band_range
    } else {
        0.5
    };

    let bandwidth = *bandwidths.last().expect("at least one band reading");
    let window_start = bandwidths.len().saturating_sub(SQUEEZE_LOOKBACK);
    let rolling_min = bandwidths[window_start..]
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    // Only meaningful once a full lookback window of bandwidths exists
    let squeeze = bandwidths.len() >= SQUEEZE_LOOKBACK
        && bandwidth <= rolling_min * SQUEEZE_TOLERANCE;

    Ok(Bollinger {
        mid: out.average,
        upper: out.upper,
        lower: out.lower,
        percent_b,
        bandwidth,
        squeeze,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_bracket_the_mean() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0)
            .collect();
        let bb = bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.lower < bb.mid && bb.mid < bb.upper);
        assert!((0.0..=1.0).contains(&bb.percent_b) || bb.percent_b.is_finite());
    }

    #[test]
    fn test_percent_b_above_one_when_price_escapes() {
        let mut closes = vec![100.0; 40];
        closes.push(140.0);
        let bb = bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.percent_b > 1.0);
    }

    #[test]
    fn test_squeeze_on_contracting_volatility() {
        // Volatile first half, dead-flat second half
        let mut closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + if i % 2 == 0 { 5.0 } else { -5.0 })
            .collect();
        closes.extend(std::iter::repeat(100.0).take(60));
        let bb = bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.squeeze);
    }

    #[test]
    fn test_warmup_fails() {
        assert!(bollinger(&[1.0; 5], 20, 2.0).is_err());
    }
}
