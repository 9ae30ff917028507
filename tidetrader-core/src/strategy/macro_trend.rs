//! Macro-trend evaluator
//!
//! Gathers rates, sentiment, flow, on-chain and institutional evidence
//! through the cache, scores every indicator on a -2..+2 scale, and maps
//! the weighted sum onto a 0-100 conviction. Absent indicators score 0 and
//! stay visible in the trace. The optional advisory model can only enrich
//! the reason text.

use super::{
    AdvisoryRequest, Decision, EvalContext, EvalError, Evaluation, Evaluator, MacroParams,
    ScoredIndicator, SignalAction, StepKind, StrategyKind, StrategySpec, Trace,
};
use crate::data::{Availability, EtfFlows, FearGreed, MacroRates, MinerStats, OnchainStats, StablecoinSupply};
use async_trait::async_trait;
use serde_json::json;
use std::time::Instant;

/// On-chain indicators carry double weight
const ONCHAIN_WEIGHT: u8 = 2;
/// Offset and span mapping the raw weighted sum onto 0..100
const RAW_OFFSET: f64 = 16.0;
const RAW_SPAN: f64 = 31.0;

/// Suggested notional cap as a fraction of equity
const MAX_EQUITY_FRACTION: f64 = 0.20;

/// Stablecoin supply must move more than this against its 90-day lag to
/// count as growing or shrinking
const SUPPLY_TREND_BAND: f64 = 0.005;

pub struct MacroEvaluator;

#[async_trait]
impl Evaluator for MacroEvaluator {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Macro
    }

    async fn evaluate(
        &self,
        spec: &StrategySpec,
        ctx: &EvalContext<'_>,
    ) -> Result<Evaluation, EvalError> {
        let params: MacroParams = serde_json::from_value(spec.parameters.clone())?;
        let mut trace = Trace::new();

        let ticker = fetch(&mut trace, "ticker_24h", ctx.market.ticker(&spec.symbol).await);
        let rates = fetch(&mut trace, "macro_fred", ctx.market.macro_rates().await);
        let fear_greed = fetch(&mut trace, "fear_greed", ctx.market.fear_greed().await);
        let etf = fetch(&mut trace, "etf_flows", ctx.market.etf_flows().await);
        let onchain = fetch(&mut trace, "onchain_btc", ctx.market.onchain_btc().await);
        let miners = fetch(&mut trace, "miners", ctx.market.miners().await);
        let supply = fetch(&mut trace, "stablecoin_supply", ctx.market.stablecoin_supply().await);
        let mnav = fetch(&mut trace, "mstr_mnav", ctx.market.mnav().await);

        let mut rows: Vec<ScoredIndicator> = Vec::with_capacity(11);
        score_rates(&mut rows, rates.as_ref());
        score_fear_greed(&mut rows, fear_greed.as_ref());
        score_supply_trend(&mut rows, supply.as_ref());
        score_etf_flows(&mut rows, etf.as_ref());
        score_onchain(&mut rows, onchain.as_ref());
        score_miners(&mut rows, miners.as_ref());
        score_mnav(&mut rows, mnav.as_ref());

        for row in &rows {
            let started = Instant::now();
            trace.record(
                StepKind::Score,
                format!("score_{}", row.name),
                &row.display,
                &row.score,
                json!({
                    "weight": row.weight,
                    "available": row.available,
                }),
                started,
            );
        }

        let raw: f64 = rows.iter().map(|r| r.score as f64 * r.weight as f64).sum();
        let conviction = ((raw + RAW_OFFSET) / RAW_SPAN * 100.0).clamp(0.0, 100.0);

        let action = if conviction >= 70.0 {
            SignalAction::Buy
        } else if conviction <= 30.0 {
            SignalAction::Sell
        } else {
            SignalAction::Hold
        };

        let suggested_notional = if action == SignalAction::Hold {
            0.0
        } else {
            let strength = ((conviction - 50.0).abs() / 50.0).clamp(0.0, 1.0);
            ctx.account.equity * MAX_EQUITY_FRACTION * strength
        };

        let mut reason = rows
            .iter()
            .filter(|r| r.score != 0)
            .map(|r| r.display.clone())
            .collect::<Vec<_>>()
            .join("; ");
        if reason.is_empty() {
            reason = "macro evidence is neutral".to_string();
        }
        let absent: Vec<&str> = rows
            .iter()
            .filter(|r| !r.available)
            .map(|r| r.name.as_str())
            .collect();
        if !absent.is_empty() {
            reason.push_str(&format!(" (unavailable: {})", absent.join(", ")));
        }

        // Best-effort advisory enrichment; never changes action or conviction
        if params.llm_enabled {
            if let Some(advisor) = ctx.advisor {
                let started = Instant::now();
                let request = AdvisoryRequest {
                    symbol: spec.symbol.clone(),
                    price: ticker.as_ref().map(|t| t.price),
                    change_24h_pct: ticker.as_ref().map(|t| t.change_24h_pct),
                    fear_greed: fear_greed.as_ref().map(|f| f.value),
                    scored: rows.clone(),
                };
                match advisor.advise(&request).await {
                    Ok(summary) => {
                        trace.record(
                            StepKind::Llm,
                            "advisory",
                            &request,
                            &summary,
                            json!({"ok": true}),
                            started,
                        );
                        reason.push_str("; advisor: ");
                        reason.push_str(summary.trim());
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "advisory call failed");
                        trace.record(
                            StepKind::Llm,
                            "advisory",
                            &request,
                            &err.to_string(),
                            json!({"ok": false}),
                            started,
                        );
                    }
                }
            }
        }

        let started = Instant::now();
        trace.record(
            StepKind::Score,
            "aggregate",
            &raw,
            &conviction,
            json!({
                "raw": raw,
                "conviction": conviction,
                "action": action.as_str(),
                "absent": absent,
            }),
            started,
        );

        Ok(Evaluation::new(
            Decision {
                action,
                conviction,
                suggested_notional,
                suggested_amount: None,
                stop_loss: None,
                take_profit: None,
                reason,
            },
            trace,
        ))
    }
}

/// Record a FETCH step and unwrap the availability into an Option
fn fetch<T: Clone + serde::Serialize>(
    trace: &mut Trace,
    label: &str,
    availability: Availability<T>,
) -> Option<T> {
    let started = Instant::now();
    trace.record(
        StepKind::Fetch,
        label,
        &label,
        &availability.value(),
        json!({"availability": availability.marker()}),
        started,
    );
    availability.into_value()
}

fn row(rows: &mut Vec<ScoredIndicator>, name: &str, display: String, score: i8, weight: u8, available: bool) {
    rows.push(ScoredIndicator {
        name: name.to_string(),
        display,
        score,
        weight,
        available,
    });
}

fn score_rates(rows: &mut Vec<ScoredIndicator>, rates: Option<&MacroRates>) {
    let fed = rates.and_then(|r| r.fed_rate);
    let score = match fed {
        Some(v) if v < 3.5 => 1,
        Some(v) if v > 5.0 => -1,
        _ => 0,
    };
    row(
        rows,
        "fed_rate",
        fed.map(|v| format!("fed rate {:.2}%", v)).unwrap_or_else(|| "fed rate n/a".into()),
        score,
        1,
        fed.is_some(),
    );

    let y10 = rates.and_then(|r| r.treasury_10y);
    let score = match y10 {
        Some(v) if v < 3.5 => 1,
        Some(v) if v > 4.5 => -1,
        _ => 0,
    };
    row(
        rows,
        "treasury_10y",
        y10.map(|v| format!("10y yield {:.2}%", v)).unwrap_or_else(|| "10y yield n/a".into()),
        score,
        1,
        y10.is_some(),
    );

    let dxy = rates.and_then(|r| r.dxy);
    let score = match dxy {
        Some(v) if v > 110.0 => -2,
        Some(v) if v > 107.0 => -1,
        Some(v) if v < 100.0 => 1,
        _ => 0,
    };
    row(
        rows,
        "dxy",
        dxy.map(|v| format!("DXY {:.1}", v)).unwrap_or_else(|| "DXY n/a".into()),
        score,
        1,
        dxy.is_some(),
    );

    let m2 = rates.and_then(|r| r.m2_growth_yoy);
    let score = match m2 {
        Some(v) if v > 5.0 => 1,
        Some(v) if v < 0.0 => -1,
        _ => 0,
    };
    row(
        rows,
        "m2_growth",
        m2.map(|v| format!("M2 {:+.1}% yoy", v)).unwrap_or_else(|| "M2 n/a".into()),
        score,
        1,
        m2.is_some(),
    );
}

fn score_fear_greed(rows: &mut Vec<ScoredIndicator>, fg: Option<&FearGreed>) {
    // Contrarian: extreme fear is a buy signal
    let score = match fg.map(|f| f.value) {
        Some(v) if v <= 25 => 1,
        Some(v) if v >= 80 => -1,
        _ => 0,
    };
    row(
        rows,
        "fear_greed",
        fg.map(|f| format!("fear&greed {} ({})", f.value, f.classification))
            .unwrap_or_else(|| "fear&greed n/a".into()),
        score,
        1,
        fg.is_some(),
    );
}

fn score_supply_trend(rows: &mut Vec<ScoredIndicator>, supply: Option<&StablecoinSupply>) {
    let trend = supply.and_then(|s| {
        s.lag_90d_usd_b.map(|lag| {
            if lag <= 0.0 {
                0
            } else {
                let change = s.total_usd_b / lag - 1.0;
                if change > SUPPLY_TREND_BAND {
                    1
                } else if change < -SUPPLY_TREND_BAND {
                    -1
                } else {
                    0
                }
            }
        })
    });
    row(
        rows,
        "stablecoin_supply",
        supply
            .map(|s| format!("stablecoins ${:.0}B", s.total_usd_b))
            .unwrap_or_else(|| "stablecoins n/a".into()),
        trend.unwrap_or(0),
        1,
        supply.is_some(),
    );
}

fn score_etf_flows(rows: &mut Vec<ScoredIndicator>, etf: Option<&EtfFlows>) {
    // Per-asset thresholds: BTC +/-200M, ETH a quarter, SOL a tenth of it;
    // the combined score stays within one unit so the raw-sum range holds
    fn flow_score(flow: Option<f64>, threshold: f64) -> i8 {
        match flow {
            Some(v) if v > threshold => 1,
            Some(v) if v < -threshold => -1,
            _ => 0,
        }
    }
    let combined = etf
        .map(|e| {
            let sum = flow_score(e.btc_usd, 200e6)
                + flow_score(e.eth_usd, 50e6)
                + flow_score(e.sol_usd, 20e6);
            sum.clamp(-1, 1)
        })
        .unwrap_or(0);
    row(
        rows,
        "etf_flows",
        etf.and_then(|e| e.btc_usd)
            .map(|v| format!("BTC ETF {:+.0}M/day", v / 1e6))
            .unwrap_or_else(|| "ETF flows n/a".into()),
        combined,
        1,
        etf.is_some(),
    );
}

fn score_onchain(rows: &mut Vec<ScoredIndicator>, onchain: Option<&OnchainStats>) {
    let ahr = onchain.and_then(|o| o.ahr999);
    let score = match ahr {
        Some(v) if v < 0.45 => 1,
        Some(v) if v > 1.2 => -1,
        _ => 0,
    };
    row(
        rows,
        "ahr999",
        ahr.map(|v| format!("ahr999 {:.2}", v)).unwrap_or_else(|| "ahr999 n/a".into()),
        score,
        ONCHAIN_WEIGHT,
        ahr.is_some(),
    );

    let mvrv = onchain.and_then(|o| o.mvrv_ratio);
    let score = match mvrv {
        Some(v) if v < 1.0 => 1,
        Some(v) if v > 3.7 => -1,
        _ => 0,
    };
    row(
        rows,
        "mvrv",
        mvrv.map(|v| format!("MVRV {:.2}", v)).unwrap_or_else(|| "MVRV n/a".into()),
        score,
        ONCHAIN_WEIGHT,
        mvrv.is_some(),
    );
}

fn score_miners(rows: &mut Vec<ScoredIndicator>, miners: Option<&MinerStats>) {
    let ratio = miners.and_then(|m| m.profitable_ratio());
    let score = match ratio {
        Some(r) if r > 0.7 => 1,
        Some(r) if r < 0.4 => -1,
        _ => 0,
    };
    row(
        rows,
        "miners",
        miners
            .map(|m| format!("{}/{} miners profitable", m.profitable, m.total))
            .unwrap_or_else(|| "miners n/a".into()),
        score,
        1,
        ratio.is_some(),
    );
}

fn score_mnav(rows: &mut Vec<ScoredIndicator>, mnav: Option<&f64>) {
    let score = match mnav {
        Some(v) if *v < 1.5 => 1,
        Some(v) if *v > 4.0 => -1,
        _ => 0,
    };
    row(
        rows,
        "mstr_mnav",
        mnav.map(|v| format!("MSTR mNAV {:.2}", v)).unwrap_or_else(|| "mNAV n/a".into()),
        score,
        1,
        mnav.is_some(),
    );
}
