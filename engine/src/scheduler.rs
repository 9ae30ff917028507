//! Strategy scheduler / run coordinator
//!
//! One periodic task per ACTIVE strategy; a per-strategy lock makes runs
//! strictly serial, so run logs for a strategy are totally ordered by
//! start time while different strategies tick concurrently. The scheduler
//! is the error boundary for ticks: nothing propagates out of one, and
//! three evaluator failures inside a sliding hour park the strategy in
//! ERROR. Shutdown stops new ticks, grants in-flight ones a grace period,
//! then aborts and closes their run logs.

use crate::datafeed::KlineStore;
use crate::repositories::{RunRepository, StrategyRepository};
use crate::services::{Notifier, PaperBroker};
use anyhow::{anyhow, Result};
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::json;
use shared::entity::watched_instruments;
use shared::models::{strategy_spec, strategy_status};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tidetrader_core::broker::{Order, OrderSize, Side};
use tidetrader_core::risk::{self, RiskConfig, RiskVerdict};
use tidetrader_core::strategy::{
    reconcile_lot_with_fill, Advisor, EvalContext, Evaluation, Evaluator, GridEvaluator,
    MacroEvaluator, MarketData, RunOutcome, SignalAction, StepKind, StrategyKind, StrategyStatus,
    TaEvaluator,
};
use tidetrader_core::data::Timeframe;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Evaluator failures inside this window before a strategy goes to ERROR
const FAILURE_WINDOW: Duration = Duration::from_secs(3600);
const FAILURE_LIMIT: usize = 3;

/// Cadence of the kline incremental sync job
const KLINE_SYNC_INTERVAL: Duration = Duration::from_secs(15 * 60);
/// Cadence of the watched-ticker warm-up job
const TICKER_WARM_INTERVAL: Duration = Duration::from_secs(60);

/// Timeframes the sync job maintains for every watched symbol
const SYNC_TIMEFRAMES: [Timeframe; 4] = [
    Timeframe::M15,
    Timeframe::H1,
    Timeframe::H4,
    Timeframe::D1,
];

pub struct StrategyScheduler {
    db: DatabaseConnection,
    market: Arc<dyn MarketData>,
    klines: Arc<KlineStore>,
    broker: Arc<PaperBroker>,
    risk: RiskConfig,
    notifier: Arc<Notifier>,
    advisor: Option<Arc<dyn Advisor>>,
    runs: RunRepository,
    strategies: StrategyRepository,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
    scheduled: Mutex<std::collections::HashSet<i64>>,
    failures: Mutex<HashMap<i64, VecDeque<Instant>>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<JoinSet<()>>,
    shutdown_grace: Duration,
}

impl StrategyScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: DatabaseConnection,
        market: Arc<dyn MarketData>,
        klines: Arc<KlineStore>,
        broker: Arc<PaperBroker>,
        risk: RiskConfig,
        notifier: Arc<Notifier>,
        advisor: Option<Arc<dyn Advisor>>,
        shutdown_grace: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            runs: RunRepository::new(db.clone()),
            strategies: StrategyRepository::new(db.clone()),
            db,
            market,
            klines,
            broker,
            risk,
            notifier,
            advisor,
            locks: Mutex::new(HashMap::new()),
            scheduled: Mutex::new(std::collections::HashSet::new()),
            failures: Mutex::new(HashMap::new()),
            shutdown,
            tasks: Mutex::new(JoinSet::new()),
            shutdown_grace,
        }
    }

    /// Schedule every ACTIVE strategy and the background data jobs
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let orphans = self.runs.close_orphan_runs("restart").await?;
        if orphans > 0 {
            warn!(orphans, "closed run logs left open by the previous process");
        }

        let active = self.strategies.active().await?;
        info!(strategies = active.len(), "scheduler starting");
        for model in &active {
            self.schedule(model.id, model.schedule_interval_s.max(1) as u64)
                .await;
        }

        self.spawn_data_jobs().await;
        Ok(())
    }

    /// Add the periodic trigger for one strategy; a strategy already on
    /// the clock keeps its existing loop (ticks skip non-ACTIVE states)
    pub async fn schedule(self: &Arc<Self>, strategy_id: i64, interval_s: u64) {
        if !self.scheduled.lock().await.insert(strategy_id) {
            debug!(strategy_id, "strategy already scheduled");
            return;
        }
        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();
        self.tasks.lock().await.spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_s.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of tokio's interval fires immediately; skip it
            // so a freshly scheduled strategy waits one full period
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.tick(strategy_id).await;
                    }
                    _ = shutdown_rx.changed() => {
                        debug!(strategy_id, "strategy loop stopping");
                        break;
                    }
                }
            }
        });
        info!(strategy_id, interval_s, "strategy scheduled");
    }

    async fn spawn_data_jobs(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();
        self.tasks.lock().await.spawn(async move {
            let mut ticker = tokio::time::interval(KLINE_SYNC_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let symbols = scheduler.symbols_to_maintain().await;
                        scheduler.klines.sync_all(&symbols, &SYNC_TIMEFRAMES).await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();
        self.tasks.lock().await.spawn(async move {
            let mut ticker = tokio::time::interval(TICKER_WARM_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for symbol in scheduler.watched_symbols().await {
                            let _ = scheduler.market.ticker(&symbol).await;
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
    }

    async fn watched_symbols(&self) -> Vec<String> {
        match watched_instruments::Entity::find().all(&self.db).await {
            Ok(rows) => rows.into_iter().map(|r| r.symbol).collect(),
            Err(err) => {
                warn!(error = %err, "failed to load watched instruments");
                Vec::new()
            }
        }
    }

    async fn symbols_to_maintain(&self) -> Vec<String> {
        let mut symbols = self.watched_symbols().await;
        if let Ok(active) = self.strategies.active().await {
            for model in active {
                if !symbols.contains(&model.symbol) {
                    symbols.push(model.symbol);
                }
            }
        }
        symbols
    }

    /// Manual run requested by the admin surface; same lock, same procedure
    pub async fn run_now(&self, strategy_id: i64) {
        self.tick(strategy_id).await;
    }

    /// Top-level error boundary: nothing escapes a tick
    async fn tick(&self, strategy_id: i64) {
        if let Err(err) = self.run_tick(strategy_id).await {
            error!(strategy_id, error = %err, "tick aborted");
        }
    }

    async fn run_tick(&self, strategy_id: i64) -> Result<()> {
        let Some(model) = self.strategies.get(strategy_id).await? else {
            debug!(strategy_id, "strategy gone, skipping tick");
            return Ok(());
        };
        if strategy_status(&model)? != StrategyStatus::Active {
            return Ok(());
        }

        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(strategy_id).or_default())
        };
        let Ok(_guard) = lock.try_lock() else {
            debug!(strategy_id, "previous run still in flight, skipping tick");
            return Ok(());
        };

        let started_at = Utc::now();
        let run_id = self.runs.open_run(strategy_id, started_at).await?;
        let spec = strategy_spec(&model)?;
        let snapshot = self.broker.snapshot().await;
        let ctx = EvalContext {
            market: self.market.as_ref(),
            account: &snapshot,
            advisor: self.advisor.as_ref().map(|a| a.as_ref()),
        };

        let evaluation = match evaluator_for(spec.kind).evaluate(&spec, &ctx).await {
            Ok(evaluation) => evaluation,
            Err(err) => {
                warn!(strategy_id, error = %err, "evaluation failed");
                self.runs
                    .close_run(run_id, RunOutcome::Failed, Some(err.to_string()), vec![])
                    .await?;
                if self.note_failure(strategy_id).await {
                    error!(strategy_id, "three failures within an hour, parking in ERROR");
                    self.strategies
                        .set_status(strategy_id, StrategyStatus::Error)
                        .await?;
                    self.notifier
                        .notify_failure(&model.name, "strategy moved to ERROR after repeated failures")
                        .await;
                }
                return Ok(());
            }
        };

        let Evaluation {
            decision,
            mut trace,
            params_update,
            pause,
        } = evaluation;

        let price_at_signal = self
            .market
            .ticker(&spec.symbol)
            .await
            .value()
            .map(|t| t.price);
        self.runs
            .insert_signal(
                strategy_id,
                &spec.symbol,
                &decision,
                price_at_signal,
                json!({
                    "decision": decision,
                    "steps": trace.len(),
                }),
            )
            .await?;

        if let Some(reason) = pause {
            info!(strategy_id, reason = %reason, "evaluator requested pause");
            self.strategies
                .set_status(strategy_id, StrategyStatus::Paused)
                .await?;
            if let Some(parameters) = params_update {
                self.strategies
                    .update_parameters(strategy_id, parameters)
                    .await?;
            }
            return self
                .finish_run(strategy_id, run_id, RunOutcome::Ok, Some(reason), trace)
                .await;
        }

        if decision.action == SignalAction::Hold {
            if let Some(parameters) = params_update {
                self.strategies
                    .update_parameters(strategy_id, parameters)
                    .await?;
            }
            return self
                .finish_run(strategy_id, run_id, RunOutcome::Ok, None, trace)
                .await;
        }

        // Translate the decision into an order
        let side = match decision.action {
            SignalAction::Buy => Side::Buy,
            SignalAction::Sell => Side::Sell,
            SignalAction::Hold => unreachable!("hold handled above"),
        };
        let size = match decision.suggested_amount {
            Some(amount) if amount > 0.0 => OrderSize::Amount(amount),
            _ => OrderSize::Notional(decision.suggested_notional),
        };
        let order = Order {
            strategy_id,
            symbol: spec.symbol.clone(),
            side,
            size,
            reason: decision.reason.clone(),
        };

        let Some(last_price) = price_at_signal else {
            return self
                .finish_run(
                    strategy_id,
                    run_id,
                    RunOutcome::Failed,
                    Some(format!("no market price for {}", spec.symbol)),
                    trace,
                )
                .await;
        };
        let notional = order.notional_at(last_price);
        if notional <= 0.0 {
            return self
                .finish_run(strategy_id, run_id, RunOutcome::Ok, None, trace)
                .await;
        }

        match risk::assess(&order, notional, &snapshot, &self.risk) {
            RiskVerdict::Veto {
                reason,
                trip_circuit_breaker,
            } => {
                if trip_circuit_breaker {
                    self.broker.set_circuit_breaker(reason.as_str()).await?;
                }
                let t0 = Instant::now();
                trace.record(
                    StepKind::Order,
                    "order",
                    &order,
                    &reason.as_str(),
                    json!({"verdict": "vetoed", "reason": reason.as_str(), "notional": notional}),
                    t0,
                );
                warn!(strategy_id, reason = %reason, "order vetoed");
                self.notifier
                    .notify_veto(&model.name, decision.action, reason)
                    .await;
                self.finish_run(
                    strategy_id,
                    run_id,
                    RunOutcome::Vetoed,
                    Some(reason.to_string()),
                    trace,
                )
                .await
            }
            RiskVerdict::Accept => {
                let t0 = Instant::now();
                match self.broker.execute(order.clone()).await {
                    Ok(fill) => {
                        trace.record(
                            StepKind::Order,
                            "order",
                            &order,
                            &fill,
                            json!({"verdict": "filled"}),
                            t0,
                        );
                        if let Some(mut parameters) = params_update {
                            // Grid lots must mirror the filled amount, not
                            // the pre-slippage quote, or the matching SELL
                            // overshoots the holding
                            if spec.kind == StrategyKind::Grid {
                                reconcile_lot_with_fill(&mut parameters, &fill);
                            }
                            self.strategies
                                .update_parameters(strategy_id, parameters)
                                .await?;
                        }
                        self.notifier
                            .notify_trade(&model.name, &fill, &decision)
                            .await;
                        self.finish_run(strategy_id, run_id, RunOutcome::Ok, None, trace)
                            .await
                    }
                    Err(err) => {
                        trace.record(
                            StepKind::Order,
                            "order",
                            &order,
                            &err.to_string(),
                            json!({"verdict": "failed"}),
                            t0,
                        );
                        warn!(strategy_id, error = %err, "broker rejected order");
                        self.notifier.notify_failure(&model.name, &err.to_string()).await;
                        self.finish_run(
                            strategy_id,
                            run_id,
                            RunOutcome::Failed,
                            Some(err.to_string()),
                            trace,
                        )
                        .await
                    }
                }
            }
        }
    }

    async fn finish_run(
        &self,
        strategy_id: i64,
        run_id: i64,
        outcome: RunOutcome,
        detail: Option<String>,
        trace: tidetrader_core::strategy::Trace,
    ) -> Result<()> {
        self.runs
            .close_run(run_id, outcome, detail, trace.into_steps())
            .await?;
        self.strategies.set_last_run(strategy_id, Utc::now()).await?;
        Ok(())
    }

    /// Sliding-window failure counter; true when the strategy must park
    async fn note_failure(&self, strategy_id: i64) -> bool {
        let mut failures = self.failures.lock().await;
        let window = failures.entry(strategy_id).or_default();
        let now = Instant::now();
        window.push_back(now);
        while let Some(front) = window.front() {
            if now.duration_since(*front) > FAILURE_WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }
        if window.len() >= FAILURE_LIMIT {
            window.clear();
            true
        } else {
            false
        }
    }

    /// Stop scheduling, wait out in-flight ticks, then force-cancel and
    /// close whatever run logs are still open
    pub async fn shutdown(&self) -> Result<()> {
        info!("scheduler shutting down");
        let _ = self.shutdown.send(true);

        let mut tasks = self.tasks.lock().await;
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(grace = ?self.shutdown_grace, "grace period elapsed, aborting in-flight ticks");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        let orphans = self.runs.close_orphan_runs("shutdown").await?;
        if orphans > 0 {
            warn!(orphans, "closed run logs cancelled by shutdown");
        }
        Ok(())
    }

    /// Admin reset for a strategy parked in ERROR or PAUSED
    pub async fn reactivate(self: &Arc<Self>, strategy_id: i64) -> Result<()> {
        let model = self
            .strategies
            .get(strategy_id)
            .await?
            .ok_or_else(|| anyhow!("strategy {} not found", strategy_id))?;
        self.strategies
            .set_status(strategy_id, StrategyStatus::Active)
            .await?;
        self.failures.lock().await.remove(&strategy_id);
        self.schedule(strategy_id, model.schedule_interval_s.max(1) as u64)
            .await;
        Ok(())
    }
}

fn evaluator_for(kind: StrategyKind) -> &'static dyn Evaluator {
    match kind {
        StrategyKind::Ta => &TaEvaluator,
        StrategyKind::Macro => &MacroEvaluator,
        StrategyKind::Grid => &GridEvaluator,
    }
}
