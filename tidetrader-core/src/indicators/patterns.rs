//! Candle pattern recognition on the last bar

use super::{require, IndicatorError};
use crate::data::BarSeries;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandlePattern {
    BullishEngulfing,
    BearishEngulfing,
    Hammer,
    ShootingStar,
    Doji,
}

impl CandlePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandlePattern::BullishEngulfing => "bullish_engulfing",
            CandlePattern::BearishEngulfing => "bearish_engulfing",
            CandlePattern::Hammer => "hammer",
            CandlePattern::ShootingStar => "shooting_star",
            CandlePattern::Doji => "doji",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, CandlePattern::BullishEngulfing | CandlePattern::Hammer)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(
            self,
            CandlePattern::BearishEngulfing | CandlePattern::ShootingStar
        )
    }
}

/// Detect patterns formed by the last bar (engulfings also look at the
/// prior bar). Conventional body/shadow ratios: doji body ≤ 10% of range,
/// hammer lower shadow ≥ 2× body with a small upper shadow, shooting star
/// symmetric, engulfings require a full body overlap of an opposite-colored
/// prior bar.
pub fn candle_patterns(series: &BarSeries) -> Result<Vec<CandlePattern>, IndicatorError> {
    require(series.len(), 2)?;

    let bars = series.bars();
    let curr = &bars[bars.len() - 1];
    let prev = &bars[bars.len() - 2];

    let mut patterns = Vec::new();
    let body = curr.body_size();
    let range = curr.range();
    if range <= 0.0 {
        return Ok(patterns);
    }

    if body / range <= 0.1 {
        patterns.push(CandlePattern::Doji);
    }

    let lower = curr.lower_shadow();
    let upper = curr.upper_shadow();
    if body > 0.0 && lower >= 2.0 * body && upper <= 0.5 * body {
        patterns.push(CandlePattern::Hammer);
    }
    if body > 0.0 && upper >= 2.0 * body && lower <= 0.5 * body {
        patterns.push(CandlePattern::ShootingStar);
    }

    if prev.is_bearish() && curr.is_bullish() && curr.open < prev.close && curr.close > prev.open {
        patterns.push(CandlePattern::BullishEngulfing);
    }
    if prev.is_bullish() && curr.is_bearish() && curr.open > prev.close && curr.close < prev.open {
        patterns.push(CandlePattern::BearishEngulfing);
    }

    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceBar;
    use chrono::{TimeZone, Utc};

    fn pair(prev: (f64, f64, f64, f64), curr: (f64, f64, f64, f64)) -> BarSeries {
        let mk = |i: i64, (o, h, l, c): (f64, f64, f64, f64)| {
            PriceBar::new(Utc.timestamp_opt(i * 3600, 0).unwrap(), o, h, l, c, 10.0)
        };
        BarSeries::from_vec(vec![mk(0, prev), mk(1, curr)])
    }

    #[test]
    fn test_bullish_engulfing() {
        // Red bar fully swallowed by a green one
        let s = pair((105.0, 106.0, 99.0, 100.0), (99.0, 107.0, 98.0, 106.0));
        assert!(candle_patterns(&s)
            .unwrap()
            .contains(&CandlePattern::BullishEngulfing));
    }

    #[test]
    fn test_bearish_engulfing() {
        let s = pair((100.0, 106.0, 99.0, 105.0), (106.0, 107.0, 98.0, 99.0));
        assert!(candle_patterns(&s)
            .unwrap()
            .contains(&CandlePattern::BearishEngulfing));
    }

    #[test]
    fn test_hammer() {
        // Long lower shadow, tiny upper shadow
        let s = pair((100.0, 101.0, 99.0, 100.5), (100.0, 101.2, 95.0, 101.0));
        assert!(candle_patterns(&s).unwrap().contains(&CandlePattern::Hammer));
    }

    #[test]
    fn test_shooting_star() {
        let s = pair((100.0, 101.0, 99.0, 100.5), (100.0, 103.5, 98.8, 99.0));
        let found = candle_patterns(&s).unwrap();
        assert!(found.contains(&CandlePattern::ShootingStar), "{:?}", found);
    }

    #[test]
    fn test_doji() {
        let s = pair((100.0, 101.0, 99.0, 100.5), (100.0, 102.0, 98.0, 100.1));
        assert!(candle_patterns(&s).unwrap().contains(&CandlePattern::Doji));
    }

    #[test]
    fn test_single_bar_fails() {
        let s = pair((100.0, 101.0, 99.0, 100.5), (100.0, 102.0, 98.0, 100.1));
        let one = BarSeries::from_vec(vec![s.bars()[0].clone()]);
        assert!(candle_patterns(&one).is_err());
    }
}
