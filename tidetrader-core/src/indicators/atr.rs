//! Average True Range (Wilder)

use super::{require, IndicatorError};
use crate::data::BarSeries;
use ta::indicators::AverageTrueRange;
use ta::{DataItem, Next};

/// ATR over the series at the last bar
pub fn atr(series: &BarSeries, period: usize) -> Result<f64, IndicatorError> {
    require(series.len(), period + 1)?;

    let mut inner = AverageTrueRange::new(period)
        .map_err(|_| IndicatorError::InsufficientData { required: 1, got: 0 })?;

    let mut value = 0.0;
    for bar in series.bars() {
        let item = DataItem::builder()
            .open(bar.open)
            .high(bar.high)
            .low(bar.low)
            .close(bar.close)
            .volume(bar.volume)
            .build()
            .map_err(|_| IndicatorError::InsufficientData {
                required: period + 1,
                got: series.len(),
            })?;
        value = inner.next(&item);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceBar;
    use chrono::{TimeZone, Utc};

    fn series(ranges: &[f64]) -> BarSeries {
        BarSeries::from_vec(
            ranges
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    PriceBar::new(
                        Utc.timestamp_opt(i as i64 * 3600, 0).unwrap(),
                        100.0,
                        100.0 + r,
                        100.0 - r,
                        100.0,
                        10.0,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_atr_reflects_range() {
        // Constant 4-point range converges toward an ATR of 4
        let s = series(&[2.0; 40]);
        let v = atr(&s, 14).unwrap();
        assert!((v - 4.0).abs() < 0.5, "atr = {}", v);
    }

    #[test]
    fn test_warmup_fails() {
        let s = series(&[2.0; 10]);
        assert!(atr(&s, 14).is_err());
    }
}
