//! OHLCV price bars and ordered bar series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Supported bar timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Bar duration
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M5 => Duration::from_secs(5 * 60),
            Timeframe::M15 => Duration::from_secs(15 * 60),
            Timeframe::H1 => Duration::from_secs(3600),
            Timeframe::H4 => Duration::from_secs(4 * 3600),
            Timeframe::D1 => Duration::from_secs(24 * 3600),
        }
    }

    /// Bar duration in milliseconds (provider APIs key on open_time ms)
    pub fn millis(&self) -> i64 {
        self.duration().as_millis() as i64
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(format!("unknown timeframe: {}", other)),
        }
    }
}

/// OHLCV price bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(
        open_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check if bar closed above its open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Check if bar closed below its open
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Absolute difference between open and close
    pub fn body_size(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Shadow above the body
    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    /// Shadow below the body
    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Total range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Ordered bar collection, oldest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarSeries {
    bars: Vec<PriceBar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self { bars: Vec::new() }
    }

    pub fn from_vec(mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.open_time);
        Self { bars }
    }

    pub fn push(&mut self, bar: PriceBar) {
        self.bars.push(bar);
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Close prices, oldest first
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// Last close price
    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Keep only the newest `limit` bars
    pub fn truncate_front(&mut self, limit: usize) {
        if self.bars.len() > limit {
            self.bars.drain(..self.bars.len() - limit);
        }
    }
}

impl From<Vec<PriceBar>> for BarSeries {
    fn from(bars: Vec<PriceBar>) -> Self {
        Self::from_vec(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(ts: i64, open: f64, close: f64) -> PriceBar {
        PriceBar::new(
            Utc.timestamp_opt(ts, 0).unwrap(),
            open,
            open.max(close) + 1.0,
            open.min(close) - 1.0,
            close,
            100.0,
        )
    }

    #[test]
    fn test_series_is_sorted_on_build() {
        let series = BarSeries::from_vec(vec![bar(200, 2.0, 3.0), bar(100, 1.0, 2.0)]);
        assert_eq!(series.bars()[0].open, 1.0);
        assert_eq!(series.last_close(), Some(3.0));
    }

    #[test]
    fn test_bar_anatomy() {
        let b = PriceBar::new(
            Utc.timestamp_opt(0, 0).unwrap(),
            100.0,
            110.0,
            95.0,
            105.0,
            1000.0,
        );
        assert!(b.is_bullish());
        assert_eq!(b.body_size(), 5.0);
        assert_eq!(b.upper_shadow(), 5.0);
        assert_eq!(b.lower_shadow(), 5.0);
        assert_eq!(b.range(), 15.0);
    }

    #[test]
    fn test_timeframe_roundtrip() {
        for tf in ["1m", "5m", "15m", "1h", "4h", "1d"] {
            assert_eq!(tf.parse::<Timeframe>().unwrap().as_str(), tf);
        }
        assert!("2h".parse::<Timeframe>().is_err());
    }
}
