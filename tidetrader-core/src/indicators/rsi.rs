//! Relative Strength Index (Wilder smoothing)

use super::{require, IndicatorError};
use ta::indicators::RelativeStrengthIndex;
use ta::Next;

/// RSI series in `[0, 100]`; the first `period` outputs are `None`
/// (the smoothing needs `period + 1` values before it stabilizes).
pub fn rsi(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    require(closes.len(), period + 1)?;

    let mut inner = RelativeStrengthIndex::new(period)
        .map_err(|_| IndicatorError::InsufficientData { required: 1, got: 0 })?;
    let mut out = Vec::with_capacity(closes.len());
    for (i, &c) in closes.iter().enumerate() {
        let next = inner.next(c);
        out.push(if i >= period { Some(next) } else { None });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::last_value;

    #[test]
    fn test_rsi_bounds() {
        // Sawtooth input keeps RSI well inside the band
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let series = rsi(&closes, 14).unwrap();
        let v = last_value(&series).unwrap();
        assert!((0.0..=100.0).contains(&v));
    }

    #[test]
    fn test_rising_market_pushes_rsi_high() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let series = rsi(&closes, 14).unwrap();
        assert!(last_value(&series).unwrap() > 70.0);
    }

    #[test]
    fn test_warmup_fails() {
        assert!(rsi(&[1.0; 10], 14).is_err());
    }
}
