//! Technical-indicator evaluator
//!
//! Per selected timeframe the full indicator set is computed and folded
//! into a 0-100 score built from additive adjustments around 50; the
//! per-timeframe scores are merged with long-biased weights, checked for
//! cross-timeframe conflicts, graded A/B/C and turned into a decision with
//! ATR-derived stop/target levels.

use super::{
    Decision, EvalContext, EvalError, Evaluation, Evaluator, SignalAction, StepKind, StrategyKind,
    StrategySpec, TaParams, Trace,
};
use crate::data::{BarSeries, Timeframe};
use crate::indicators::{
    atr, bollinger, candle_patterns, ema, last_value, macd, rsi, stoch_rsi, trend_structure,
    volume_profile, CandlePattern, MacdCross, TrendLabel, VolumeTrend,
};
use async_trait::async_trait;
use serde_json::json;
use std::time::Instant;

/// Minimum bars a timeframe needs before it participates in scoring
const MIN_BARS: usize = 30;

/// Weights when the daily timeframe is not selected
const WEIGHTS_3TF: [(Timeframe, f64); 3] = [
    (Timeframe::M15, 0.15),
    (Timeframe::H1, 0.35),
    (Timeframe::H4, 0.50),
];

/// Weights when the daily timeframe is selected
const WEIGHTS_4TF: [(Timeframe, f64); 4] = [
    (Timeframe::M15, 0.10),
    (Timeframe::H1, 0.20),
    (Timeframe::H4, 0.30),
    (Timeframe::D1, 0.40),
];

pub struct TaEvaluator;

/// Per-timeframe scoring result
#[derive(Debug, Clone)]
struct TfAnalysis {
    timeframe: Timeframe,
    score: f64,
    macd_cross: MacdCross,
    close: f64,
    atr: Option<f64>,
    notes: Vec<String>,
}

#[async_trait]
impl Evaluator for TaEvaluator {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Ta
    }

    async fn evaluate(
        &self,
        spec: &StrategySpec,
        ctx: &EvalContext<'_>,
    ) -> Result<Evaluation, EvalError> {
        let params: TaParams = serde_json::from_value(spec.parameters.clone())?;
        params.validate().map_err(EvalError::BadParams)?;

        let mut trace = Trace::new();
        let mut analyses: Vec<TfAnalysis> = Vec::new();

        for &tf in &params.timeframes {
            let started = Instant::now();
            let window = ctx.market.klines(&spec.symbol, tf, params.klines_limit).await;
            let bars = window.value().map(|w| w.series.len()).unwrap_or(0);
            trace.record(
                StepKind::Fetch,
                format!("klines_{}", tf),
                &(&spec.symbol, tf.as_str(), params.klines_limit),
                &bars,
                json!({
                    "availability": window.marker(),
                    "bars": bars,
                    "source": window.value().map(|w| w.source),
                }),
                started,
            );

            if let Some(window) = window.value() {
                if window.series.len() >= MIN_BARS {
                    analyses.push(score_timeframe(&mut trace, tf, &window.series));
                } else {
                    tracing::debug!(
                        timeframe = %tf,
                        bars = window.series.len(),
                        "skipping timeframe below warm-up"
                    );
                }
            }
        }

        if analyses.is_empty() {
            let started = Instant::now();
            let decision = Decision::hold("no timeframe had usable market data");
            trace.record(
                StepKind::Score,
                "aggregate",
                &0,
                &decision.conviction,
                json!({"timeframes": 0}),
                started,
            );
            return Ok(Evaluation::new(decision, trace));
        }

        let started = Instant::now();
        let scored: Vec<(Timeframe, f64)> =
            analyses.iter().map(|a| (a.timeframe, a.score)).collect();
        let (score, conflict) = aggregate_scores(&scored);

        let primary = primary_analysis(&analyses);
        let grade = grade_signal(&analyses, primary, score);

        let action = if score >= params.buy_threshold {
            SignalAction::Buy
        } else if score <= params.sell_threshold {
            SignalAction::Sell
        } else {
            SignalAction::Hold
        };

        let price = primary.close;
        let (stop_loss, take_profit) = match (action, primary.atr) {
            (SignalAction::Buy, Some(atr)) => (
                Some(price - atr * params.atr_stop_mult),
                Some(price + atr * params.atr_target_mult),
            ),
            (SignalAction::Sell, Some(atr)) => (
                Some(price + atr * params.atr_stop_mult),
                Some(price - atr * params.atr_target_mult),
            ),
            _ => (None, None),
        };

        let strength = (((score - 50.0).abs() - 15.0) / 35.0).clamp(0.0, 1.0);
        let suggested_notional = if action == SignalAction::Hold {
            0.0
        } else {
            ctx.account.equity * params.base_size_pct / 100.0 * strength
        };

        let mut notes: Vec<String> = analyses.iter().flat_map(|a| a.notes.clone()).collect();
        if conflict {
            notes.push("timeframe conflict, holding".to_string());
        }
        notes.truncate(8);
        let reason = format!(
            "[grade {}] {}",
            grade,
            if notes.is_empty() {
                "no standout signals".to_string()
            } else {
                notes.join("; ")
            }
        );

        trace.record(
            StepKind::Score,
            "aggregate",
            &scored,
            &score,
            json!({
                "per_timeframe": scored
                    .iter()
                    .map(|(tf, s)| json!({"timeframe": tf.as_str(), "score": s}))
                    .collect::<Vec<_>>(),
                "conflict_clamp": conflict,
                "grade": grade.to_string(),
                "action": action.as_str(),
            }),
            started,
        );

        Ok(Evaluation::new(
            Decision {
                action,
                conviction: score,
                suggested_notional,
                suggested_amount: None,
                stop_loss,
                take_profit,
                reason,
            },
            trace,
        ))
    }
}

/// Merge per-timeframe scores with the canonical weight table, normalized
/// by the total weight of the timeframes present. Returns the aggregate
/// and whether the conflict rule fired (longest timeframe bearish while a
/// shorter one is bullish forces the score to the HOLD midpoint).
fn aggregate_scores(scores: &[(Timeframe, f64)]) -> (f64, bool) {
    let has_daily = scores.iter().any(|(tf, _)| *tf == Timeframe::D1);
    let table: &[(Timeframe, f64)] = if has_daily { &WEIGHTS_4TF } else { &WEIGHTS_3TF };
    let weight_of = |tf: Timeframe| {
        table
            .iter()
            .find(|(t, _)| *t == tf)
            .map(|(_, w)| *w)
            .unwrap_or(0.1)
    };

    let mut weighted = 0.0;
    let mut total = 0.0;
    for &(tf, score) in scores {
        weighted += score * weight_of(tf);
        total += weight_of(tf);
    }
    let aggregate = if total > 0.0 { weighted / total } else { 50.0 };

    let longest = scores
        .iter()
        .max_by_key(|(tf, _)| tf.duration())
        .expect("scores is non-empty");
    let conflict = longest.1 <= 40.0
        && scores
            .iter()
            .any(|(tf, s)| tf.duration() < longest.0.duration() && *s >= 60.0);

    if conflict {
        (50.0, true)
    } else {
        (aggregate.clamp(0.0, 100.0), false)
    }
}

/// Stop/target come from the 4h timeframe when selected, else 1h, else the
/// first analyzed one.
fn primary_analysis(analyses: &[TfAnalysis]) -> &TfAnalysis {
    analyses
        .iter()
        .find(|a| a.timeframe == Timeframe::H4)
        .or_else(|| analyses.iter().find(|a| a.timeframe == Timeframe::H1))
        .unwrap_or(&analyses[0])
}

/// A: two thirds of timeframes at an extreme and an extreme aggregate.
/// B: half the timeframes aligned with the aggregate direction, or a MACD
/// cross on the primary timeframe. C: everything else.
fn grade_signal(analyses: &[TfAnalysis], primary: &TfAnalysis, aggregate: f64) -> char {
    let total = analyses.len();
    let extremes = analyses
        .iter()
        .filter(|a| a.score >= 70.0 || a.score <= 30.0)
        .count();
    if extremes * 3 >= total * 2 && (aggregate >= 78.0 || aggregate <= 22.0) {
        return 'A';
    }

    let aligned = analyses
        .iter()
        .filter(|a| {
            (aggregate > 50.0 && a.score > 50.0) || (aggregate < 50.0 && a.score < 50.0)
        })
        .count();
    if aligned * 2 >= total || primary.macd_cross != MacdCross::None {
        'B'
    } else {
        'C'
    }
}

/// Score one timeframe: start at 50, apply the adjustment table, clamp to
/// [0, 100]. Indicators below warm-up contribute nothing.
fn score_timeframe(trace: &mut Trace, tf: Timeframe, series: &BarSeries) -> TfAnalysis {
    let closes = series.closes();
    let volumes = series.volumes();
    let close = *closes.last().expect("series checked non-empty");
    let last_bar = series.last().expect("series checked non-empty");

    let mut score = 50.0;
    let mut notes = Vec::new();

    // EMA stack: +15 fully bullish, -15 fully bearish, proportional between
    let started = Instant::now();
    let e9 = ema(&closes, 9).ok().and_then(|s| last_value(&s));
    let e21 = ema(&closes, 21).ok().and_then(|s| last_value(&s));
    let e50 = ema(&closes, 50).ok().and_then(|s| last_value(&s));
    let e200 = ema(&closes, 200).ok().and_then(|s| last_value(&s));

    let mut links: Vec<bool> = Vec::with_capacity(4);
    let mut prev = close;
    for value in [e9, e21, e50, e200].into_iter().flatten() {
        links.push(prev > value);
        prev = value;
    }
    let ema_adj = if links.is_empty() {
        0.0
    } else {
        let satisfied = links.iter().filter(|&&up| up).count() as f64;
        let n = links.len() as f64;
        15.0 * (2.0 * satisfied - n) / n
    };
    score += ema_adj;
    if !links.is_empty() && links.iter().all(|&up| up) {
        notes.push(format!("[{}] bullish EMA stack", tf));
    } else if !links.is_empty() && links.iter().all(|&up| !up) {
        notes.push(format!("[{}] bearish EMA stack", tf));
    }
    trace.record(
        StepKind::Compute,
        format!("ema_{}", tf),
        &closes.len(),
        &(e9, e21, e50, e200),
        json!({"adjustment": ema_adj}),
        started,
    );

    // RSI (StochRSI is computed for the record but carries no adjustment)
    let started = Instant::now();
    let rsi_value = rsi(&closes, 14).ok().and_then(|s| last_value(&s));
    let stoch = stoch_rsi(&closes, 14, 3, 3).ok();
    let rsi_adj = match rsi_value {
        Some(r) if r < 30.0 => {
            notes.push(format!("[{}] RSI oversold ({:.0})", tf, r));
            10.0
        }
        Some(r) if r > 70.0 => {
            notes.push(format!("[{}] RSI overbought ({:.0})", tf, r));
            -10.0
        }
        _ => 0.0,
    };
    score += rsi_adj;
    trace.record(
        StepKind::Compute,
        format!("momentum_{}", tf),
        &closes.len(),
        &(rsi_value, stoch.as_ref().map(|s| (s.k, s.d))),
        json!({"adjustment": rsi_adj}),
        started,
    );

    // MACD
    let started = Instant::now();
    let macd_result = macd(&closes, 12, 26, 9).ok();
    let mut macd_cross = MacdCross::None;
    let macd_adj = match &macd_result {
        Some(m) => {
            macd_cross = m.cross;
            match m.cross {
                MacdCross::Golden => {
                    notes.push(format!("[{}] MACD golden cross", tf));
                    10.0
                }
                MacdCross::Death => {
                    notes.push(format!("[{}] MACD death cross", tf));
                    -10.0
                }
                MacdCross::None => {
                    if m.histogram > m.prev_histogram && m.macd_line > 0.0 {
                        3.0
                    } else {
                        0.0
                    }
                }
            }
        }
        None => 0.0,
    };
    score += macd_adj;
    trace.record(
        StepKind::Compute,
        format!("macd_{}", tf),
        &closes.len(),
        &macd_result,
        json!({"adjustment": macd_adj}),
        started,
    );

    // Bollinger %B and squeeze
    let started = Instant::now();
    let bb = bollinger(&closes, 20, 2.0).ok();
    let mut bb_adj = 0.0;
    if let Some(bb) = &bb {
        if bb.percent_b < 0.0 {
            bb_adj += 6.0;
            notes.push(format!("[{}] below lower band", tf));
        } else if bb.percent_b > 1.0 {
            bb_adj -= 6.0;
            notes.push(format!("[{}] above upper band", tf));
        }
        if bb.squeeze {
            bb_adj += if close > bb.mid { 3.0 } else { -3.0 };
            notes.push(format!("[{}] band squeeze", tf));
        }
    }
    score += bb_adj;
    trace.record(
        StepKind::Compute,
        format!("bollinger_{}", tf),
        &closes.len(),
        &bb,
        json!({"adjustment": bb_adj}),
        started,
    );

    // Volume: a surge amplifies the close direction
    let started = Instant::now();
    let volume = volume_profile(&volumes, 20).ok();
    let volume_adj = match volume.as_ref().map(|v| v.trend) {
        Some(VolumeTrend::Surge) if last_bar.is_bullish() => {
            notes.push(format!("[{}] volume surge on an up close", tf));
            5.0
        }
        Some(VolumeTrend::Surge) if last_bar.is_bearish() => {
            notes.push(format!("[{}] volume surge on a down close", tf));
            -5.0
        }
        _ => 0.0,
    };
    score += volume_adj;
    trace.record(
        StepKind::Compute,
        format!("volume_{}", tf),
        &volumes.len(),
        &volume,
        json!({"adjustment": volume_adj}),
        started,
    );

    // Trend structure and candle patterns
    let started = Instant::now();
    let structure = trend_structure(series, 50).ok();
    let structure_adj = match structure.as_ref().map(|s| s.label) {
        Some(TrendLabel::Uptrend) => {
            notes.push(format!("[{}] uptrend structure", tf));
            5.0
        }
        Some(TrendLabel::Downtrend) => {
            notes.push(format!("[{}] downtrend structure", tf));
            -5.0
        }
        _ => 0.0,
    };
    score += structure_adj;

    let patterns = candle_patterns(series).unwrap_or_default();
    let mut pattern_adj = 0.0;
    if patterns.iter().any(CandlePattern::is_bullish) {
        pattern_adj += 4.0;
        notes.push(format!("[{}] bullish reversal candle", tf));
    }
    if patterns.iter().any(CandlePattern::is_bearish) {
        pattern_adj -= 4.0;
        notes.push(format!("[{}] bearish reversal candle", tf));
    }
    score += pattern_adj;
    trace.record(
        StepKind::Compute,
        format!("structure_{}", tf),
        &series.len(),
        &(structure, &patterns),
        json!({"adjustment": structure_adj + pattern_adj}),
        started,
    );

    let score = score.clamp(0.0, 100.0);
    let atr_value = atr(series, 14).ok();

    let started = Instant::now();
    trace.record(
        StepKind::Score,
        format!("score_{}", tf),
        &closes.len(),
        &score,
        json!({
            "score": score,
            "atr": atr_value,
            "close": close,
        }),
        started,
    );

    TfAnalysis {
        timeframe: tf,
        score,
        macd_cross,
        close,
        atr: atr_value,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::AccountSnapshot;
    use crate::data::{
        Availability, EtfFlows, FearGreed, MacroRates, MinerStats, OnchainStats, PriceBar,
        StablecoinSupply, Ticker24h,
    };
    use crate::strategy::{EvalContext, KlineSource, KlineWindow, MarketData};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    #[test]
    fn test_conflict_clamp_scenario() {
        // 4h at 30 (bearish), 1h at 72 (bullish): weighted 40.2 normalized,
        // but the conflict rule wins and the score pins to the HOLD midpoint
        let (score, conflict) = aggregate_scores(&[(Timeframe::H1, 72.0), (Timeframe::H4, 30.0)]);
        assert!(conflict);
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_aggregate_is_weight_normalized() {
        let (score, conflict) = aggregate_scores(&[(Timeframe::H1, 60.0), (Timeframe::H4, 60.0)]);
        assert!(!conflict);
        assert!((score - 60.0).abs() < 1e-9);

        // Long-biased: 4h pulls harder than 1h
        let (score, _) = aggregate_scores(&[(Timeframe::H1, 40.0), (Timeframe::H4, 70.0)]);
        let expected = (40.0 * 0.35 + 70.0 * 0.50) / 0.85;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_equal_weight_swap_invariance() {
        // Swapping the scores of two timeframes that carry equal weight
        // cannot move the aggregate
        let a = aggregate_scores(&[(Timeframe::H1, 55.0), (Timeframe::H4, 58.0)]);
        let b = aggregate_scores(&[(Timeframe::H1, 58.0), (Timeframe::H4, 55.0)]);
        let swapped_weight_sum = 55.0 * 0.35 + 58.0 * 0.50;
        let other = 58.0 * 0.35 + 55.0 * 0.50;
        // Scores differ exactly by the weight asymmetry, which verifies the
        // weighting is per-timeframe rather than positional
        assert!((a.0 * 0.85 - swapped_weight_sum).abs() < 1e-9);
        assert!((b.0 * 0.85 - other).abs() < 1e-9);
    }

    #[test]
    fn test_daily_switches_weight_table() {
        let (score, _) = aggregate_scores(&[
            (Timeframe::H1, 80.0),
            (Timeframe::H4, 80.0),
            (Timeframe::D1, 20.0),
        ]);
        let expected = (80.0 * 0.20 + 80.0 * 0.30 + 20.0 * 0.40) / 0.90;
        assert!((score - expected).abs() < 1e-9);
    }

    // --- end-to-end over a fixture market ---

    struct FixtureMarket {
        klines: HashMap<Timeframe, BarSeries>,
    }

    #[async_trait]
    impl MarketData for FixtureMarket {
        async fn klines(
            &self,
            _symbol: &str,
            timeframe: Timeframe,
            _limit: usize,
        ) -> Availability<KlineWindow> {
            match self.klines.get(&timeframe) {
                Some(series) => Availability::Fresh(KlineWindow {
                    series: series.clone(),
                    source: KlineSource::Local,
                }),
                None => Availability::Absent,
            }
        }

        async fn ticker(&self, _symbol: &str) -> Availability<Ticker24h> {
            Availability::Absent
        }
        async fn macro_rates(&self) -> Availability<MacroRates> {
            Availability::Absent
        }
        async fn fear_greed(&self) -> Availability<FearGreed> {
            Availability::Absent
        }
        async fn etf_flows(&self) -> Availability<EtfFlows> {
            Availability::Absent
        }
        async fn onchain_btc(&self) -> Availability<OnchainStats> {
            Availability::Absent
        }
        async fn miners(&self) -> Availability<MinerStats> {
            Availability::Absent
        }
        async fn stablecoin_supply(&self) -> Availability<StablecoinSupply> {
            Availability::Absent
        }
        async fn mnav(&self) -> Availability<f64> {
            Availability::Absent
        }
    }

    fn account(equity: f64) -> AccountSnapshot {
        AccountSnapshot {
            cash: equity,
            equity,
            equity_high_water_mark: equity,
            circuit_breaker_active: false,
            circuit_breaker_reason: None,
            positions: vec![],
        }
    }

    /// Zig-zag climb: swing structure plus a net drift upward
    fn drifting_series(drift: f64, bars: usize) -> BarSeries {
        BarSeries::from_vec(
            (0..bars)
                .map(|i| {
                    let wave = if (i / 5) % 2 == 0 { 30.0 } else { -30.0 };
                    let close = 10_000.0 + i as f64 * drift + wave;
                    PriceBar::new(
                        Utc.timestamp_opt(i as i64 * 3600, 0).unwrap(),
                        close - drift / 2.0,
                        close + 20.0,
                        close - 20.0,
                        close,
                        100.0,
                    )
                })
                .collect(),
        )
    }

    fn spec() -> StrategySpec {
        StrategySpec {
            id: 1,
            name: "ta-test".into(),
            kind: StrategyKind::Ta,
            symbol: "BTC".into(),
            parameters: serde_json::json!({"timeframes": ["1h", "4h"]}),
        }
    }

    #[tokio::test]
    async fn test_no_data_yields_hold() {
        let market = FixtureMarket {
            klines: HashMap::new(),
        };
        let snapshot = account(10_000.0);
        let ctx = EvalContext {
            market: &market,
            account: &snapshot,
            advisor: None,
        };
        let eval = TaEvaluator.evaluate(&spec(), &ctx).await.unwrap();
        assert_eq!(eval.decision.action, SignalAction::Hold);
        assert_eq!(eval.decision.suggested_notional, 0.0);
        // FETCH per timeframe plus the final SCORE
        assert_eq!(eval.trace.len(), 3);
    }

    #[tokio::test]
    async fn test_uptrend_market_scores_bullish() {
        let mut klines = HashMap::new();
        klines.insert(Timeframe::H1, drifting_series(12.0, 300));
        klines.insert(Timeframe::H4, drifting_series(12.0, 300));
        let market = FixtureMarket { klines };
        let snapshot = account(10_000.0);
        let ctx = EvalContext {
            market: &market,
            account: &snapshot,
            advisor: None,
        };

        let eval = TaEvaluator.evaluate(&spec(), &ctx).await.unwrap();
        assert!(eval.decision.conviction > 50.0);
        assert_ne!(eval.decision.action, SignalAction::Sell);
        // Dense 1-based step indices across the whole run
        for (i, step) in eval.trace.steps().iter().enumerate() {
            assert_eq!(step.step_index as usize, i + 1);
        }
        // Both timeframes fetched, scored, and one aggregate step
        assert!(eval
            .trace
            .steps()
            .iter()
            .any(|s| s.kind == StepKind::Score && s.label == "aggregate"));
    }

    #[tokio::test]
    async fn test_buy_sizes_against_equity() {
        let mut klines = HashMap::new();
        klines.insert(Timeframe::H4, drifting_series(15.0, 300));
        let market = FixtureMarket { klines };
        let snapshot = account(10_000.0);
        let ctx = EvalContext {
            market: &market,
            account: &snapshot,
            advisor: None,
        };

        let eval = TaEvaluator.evaluate(&spec(), &ctx).await.unwrap();
        // Size never exceeds the 10% base allocation
        assert!(eval.decision.suggested_notional <= 10_000.0 * 0.10 + 1e-9);
        if eval.decision.action == SignalAction::Buy {
            let stop = eval.decision.stop_loss.unwrap();
            let target = eval.decision.take_profit.unwrap();
            assert!(stop < target);
        }
    }
}
