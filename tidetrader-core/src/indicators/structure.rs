//! Trend structure from swing highs and lows

use super::{require, IndicatorError};
use crate::data::BarSeries;
use serde::{Deserialize, Serialize};

/// Bars on each side a swing point must dominate
const SWING_WING: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendLabel {
    #[serde(rename = "UPTREND")]
    Uptrend,
    #[serde(rename = "DOWNTREND")]
    Downtrend,
    #[serde(rename = "CONSOLIDATION")]
    Consolidation,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::Uptrend => "UPTREND",
            TrendLabel::Downtrend => "DOWNTREND",
            TrendLabel::Consolidation => "CONSOLIDATION",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendStructure {
    pub label: TrendLabel,
    pub recent_high: f64,
    pub recent_low: f64,
}

/// Classify the last `lookback` bars by their swing sequence.
///
/// A swing high is a bar whose high exceeds the highs of the two bars on
/// each side (a 5-bar window); swing lows are symmetric. Higher highs and
/// higher lows label the window UPTREND, lower both DOWNTREND, anything
/// else CONSOLIDATION.
pub fn trend_structure(
    series: &BarSeries,
    lookback: usize,
) -> Result<TrendStructure, IndicatorError> {
    require(series.len(), lookback)?;

    let bars = &series.bars()[series.len() - lookback..];
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

    let swing_highs = swing_points(&highs, |center, neighbor| center > neighbor);
    let swing_lows = swing_points(&lows, |center, neighbor| center < neighbor);

    let label = match (swing_highs.as_slice(), swing_lows.as_slice()) {
        ([.., h1, h2], [.., l1, l2]) => {
            if h2 > h1 && l2 > l1 {
                TrendLabel::Uptrend
            } else if h2 < h1 && l2 < l1 {
                TrendLabel::Downtrend
            } else {
                TrendLabel::Consolidation
            }
        }
        _ => TrendLabel::Consolidation,
    };

    Ok(TrendStructure {
        label,
        recent_high: highs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        recent_low: lows.iter().copied().fold(f64::INFINITY, f64::min),
    })
}

fn swing_points(values: &[f64], dominates: impl Fn(f64, f64) -> bool) -> Vec<f64> {
    let mut points = Vec::new();
    for i in SWING_WING..values.len().saturating_sub(SWING_WING) {
        let center = values[i];
        let wins = (i - SWING_WING..=i + SWING_WING)
            .filter(|&j| j != i)
            .all(|j| dominates(center, values[j]));
        if wins {
            points.push(center);
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceBar;
    use chrono::{TimeZone, Utc};

    fn series_from_closes(closes: &[f64]) -> BarSeries {
        BarSeries::from_vec(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    PriceBar::new(
                        Utc.timestamp_opt(i as i64 * 3600, 0).unwrap(),
                        c,
                        c + 1.0,
                        c - 1.0,
                        c,
                        10.0,
                    )
                })
                .collect(),
        )
    }

    /// Zig-zag around a drifting base: swings every 5 bars
    fn zigzag(drift_per_bar: f64) -> Vec<f64> {
        (0..50)
            .map(|i| {
                let wave = if (i / 5) % 2 == 0 { 5.0 } else { -5.0 };
                1000.0 + i as f64 * drift_per_bar + wave
            })
            .collect()
    }

    #[test]
    fn test_uptrend() {
        let s = series_from_closes(&zigzag(1.0));
        assert_eq!(
            trend_structure(&s, 50).unwrap().label,
            TrendLabel::Uptrend
        );
    }

    #[test]
    fn test_downtrend() {
        let s = series_from_closes(&zigzag(-1.0));
        assert_eq!(
            trend_structure(&s, 50).unwrap().label,
            TrendLabel::Downtrend
        );
    }

    #[test]
    fn test_flat_is_consolidation() {
        let s = series_from_closes(&zigzag(0.0));
        assert_eq!(
            trend_structure(&s, 50).unwrap().label,
            TrendLabel::Consolidation
        );
    }

    #[test]
    fn test_warmup_fails() {
        let s = series_from_closes(&[100.0; 20]);
        assert!(trend_structure(&s, 50).is_err());
    }
}
