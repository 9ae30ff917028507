//! Exponential and simple moving averages

use super::{require, IndicatorError};
use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use ta::Next;

/// EMA series aligned to the input; the first `period - 1` outputs are `None`
pub fn ema(values: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    require(values.len(), period)?;

    let mut inner = ExponentialMovingAverage::new(period)
        .map_err(|_| IndicatorError::InsufficientData { required: 1, got: 0 })?;
    let mut out = Vec::with_capacity(values.len());
    for (i, &v) in values.iter().enumerate() {
        let next = inner.next(v);
        out.push(if i + 1 >= period { Some(next) } else { None });
    }
    Ok(out)
}

/// SMA series aligned to the input; the first `period - 1` outputs are `None`
pub fn sma(values: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    require(values.len(), period)?;

    let mut inner = SimpleMovingAverage::new(period)
        .map_err(|_| IndicatorError::InsufficientData { required: 1, got: 0 })?;
    let mut out = Vec::with_capacity(values.len());
    for (i, &v) in values.iter().enumerate() {
        let next = inner.next(v);
        out.push(if i + 1 >= period { Some(next) } else { None });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::last_value;

    #[test]
    fn test_warmup_is_masked() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let series = ema(&values, 5).unwrap();
        assert_eq!(series.len(), 10);
        assert!(series[..4].iter().all(Option::is_none));
        assert!(series[4..].iter().all(Option::is_some));
    }

    #[test]
    fn test_sma_of_constant_input() {
        let values = vec![42.0; 30];
        let series = sma(&values, 20).unwrap();
        assert!((last_value(&series).unwrap() - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_input_fails() {
        let err = ema(&[1.0, 2.0], 5).unwrap_err();
        assert_eq!(
            err,
            IndicatorError::InsufficientData {
                required: 5,
                got: 2
            }
        );
    }
}
