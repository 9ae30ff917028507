//! Run coordinator flows: orders, vetoes, circuit breaker, failure parking

mod common;

use chrono::Utc;
use common::{setup_db, FixtureMarket};
use engine::datafeed::collectors::BinanceCollector;
use engine::datafeed::KlineStore;
use engine::scheduler::StrategyScheduler;
use engine::services::{Notifier, PaperBroker, PaperRoute};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde_json::json;
use shared::entity::{account, run_logs, signals, strategies, trace_steps, trades};
use std::sync::Arc;
use std::time::Duration;
use tidetrader_core::broker::{FeeSchedule, Order, OrderSize, Side};
use tidetrader_core::risk::RiskConfig;

async fn make_broker(
    db: DatabaseConnection,
    market: Arc<FixtureMarket>,
    cash: f64,
) -> Arc<PaperBroker> {
    Arc::new(
        PaperBroker::load(db, market, FeeSchedule::default(), Arc::new(PaperRoute), cash)
            .await
            .expect("broker loads"),
    )
}

fn make_scheduler(
    db: DatabaseConnection,
    market: Arc<FixtureMarket>,
    broker: Arc<PaperBroker>,
    risk: RiskConfig,
) -> Arc<StrategyScheduler> {
    let klines = Arc::new(KlineStore::new(
        db.clone(),
        BinanceCollector::new(reqwest::Client::new()),
    ));
    Arc::new(StrategyScheduler::new(
        db,
        market,
        klines,
        broker,
        risk,
        Arc::new(Notifier::from_config(None, None)),
        None,
        Duration::from_secs(5),
    ))
}

/// Wide-open caps except drawdown, so tests pick the check they exercise
fn permissive_risk() -> RiskConfig {
    RiskConfig {
        max_trade_notional_pct: 100.0,
        max_symbol_exposure_pct: 100.0,
        soft_drawdown_pct: 100.0,
        hard_drawdown_pct: 100.0,
    }
}

fn grid_levels(lower: f64, upper: f64, count: usize) -> Vec<f64> {
    let ratio = upper / lower;
    (0..=count)
        .map(|i| lower * ratio.powf(i as f64 / count as f64))
        .collect()
}

async fn insert_grid_strategy(
    db: &DatabaseConnection,
    symbol: &str,
    lower: f64,
    upper: f64,
    capital: f64,
    level_index: usize,
    lots: Vec<f64>,
) -> i64 {
    let state = json!({
        "levels": grid_levels(lower, upper, 4),
        "level_index": level_index,
        "lots": lots,
    });
    let model = strategies::ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        name: Set(format!("grid-{}", symbol.to_lowercase())),
        kind: Set("GRID".into()),
        symbol: Set(symbol.to_uppercase()),
        status: Set("ACTIVE".into()),
        schedule_interval_s: Set(30),
        parameters: Set(json!({
            "lower_price": lower,
            "upper_price": upper,
            "grid_count": 4,
            "capital_per_grid": capital,
            "state": state,
        })),
        last_run_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("strategy row");
    model.id
}

#[tokio::test]
async fn test_grid_cross_executes_buy_end_to_end() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 98_000.0);
    let broker = make_broker(db.clone(), market.clone(), 10_000.0).await;
    let scheduler = make_scheduler(db.clone(), market, broker, permissive_risk());

    // Seeded one level above the current price: the tick crosses down
    let id = insert_grid_strategy(&db, "BTC", 90_000.0, 110_000.0, 1_000.0, 3, vec![]).await;
    scheduler.run_now(id).await;

    let stored_trades = trades::Entity::find().all(&db).await.unwrap();
    assert_eq!(stored_trades.len(), 1);
    assert_eq!(stored_trades[0].side, "BUY");
    let expected_amount = 1_000.0 / (98_000.0 * 1.0005);
    assert!((stored_trades[0].amount - expected_amount).abs() < 1e-9);

    let stored_signals = signals::Entity::find().all(&db).await.unwrap();
    assert_eq!(stored_signals.len(), 1);
    assert_eq!(stored_signals[0].action, "BUY");
    assert_eq!(stored_signals[0].conviction, 80.0);

    let runs = run_logs::Entity::find().all(&db).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].outcome, "OK");
    assert!(runs[0].finished_at.is_some());

    // Grid state committed after the fill
    let model = strategies::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();
    let state = &model.parameters["state"];
    assert_eq!(state["level_index"], 2);
    assert_eq!(state["lots"].as_array().unwrap().len(), 1);

    // Trace: dense 1-based indices, ends with the ORDER step
    let steps = trace_steps::Entity::find()
        .filter(trace_steps::Column::RunId.eq(runs[0].id))
        .order_by_asc(trace_steps::Column::StepIndex)
        .all(&db)
        .await
        .unwrap();
    assert!(!steps.is_empty());
    for (i, step) in steps.iter().enumerate() {
        assert_eq!(step.step_index, i as i32 + 1);
    }
    assert_eq!(steps.last().unwrap().kind, "ORDER");
}

#[tokio::test]
async fn test_grid_round_trip_sells_the_filled_lot() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 98_000.0);
    let broker = make_broker(db.clone(), market.clone(), 10_000.0).await;
    let scheduler = make_scheduler(db.clone(), market.clone(), broker, permissive_risk());

    let id = insert_grid_strategy(&db, "BTC", 90_000.0, 110_000.0, 1_000.0, 3, vec![]).await;

    // Downward cross buys one grid; the default fee schedule applies
    // slippage, so the position holds less than 1000/98000
    scheduler.run_now(id).await;
    let buy = trades::Entity::find().all(&db).await.unwrap();
    assert_eq!(buy.len(), 1);
    let bought_amount = buy[0].amount;
    assert!((bought_amount - 1_000.0 / (98_000.0 * 1.0005)).abs() < 1e-9);

    // The committed lot mirrors the fill, not the pre-slippage quote
    let model = strategies::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();
    let lots = model.parameters["state"]["lots"].as_array().unwrap();
    assert_eq!(lots.len(), 1);
    assert!((lots[0].as_f64().unwrap() - bought_amount).abs() < 1e-12);

    // Upward cross sells that exact lot; the broker must accept it
    market.set_price("BTC", 105_000.0);
    scheduler.run_now(id).await;

    let all = trades::Entity::find()
        .order_by_asc(trades::Column::Id)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].side, "SELL");
    assert!((all[1].amount - bought_amount).abs() < 1e-12);

    // Full lot closed: no position row survives and no lot remains open
    assert!(shared::entity::positions::Entity::find()
        .all(&db)
        .await
        .unwrap()
        .is_empty());
    let model = strategies::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();
    assert!(model.parameters["state"]["lots"].as_array().unwrap().is_empty());
    assert_eq!(model.parameters["state"]["level_index"], 3);

    let runs = run_logs::Entity::find()
        .filter(run_logs::Column::StrategyId.eq(id))
        .order_by_asc(run_logs::Column::StartedAt)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.outcome == "OK"));
}

#[tokio::test]
async fn test_exposure_cap_vetoes_and_writes_signal() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 98_000.0);
    let broker = make_broker(db.clone(), market.clone(), 10_000.0).await;

    // Existing BTC position worth ~2000 against ~10000 equity (20%)
    broker
        .execute(Order {
            strategy_id: 0,
            symbol: "BTC".into(),
            side: Side::Buy,
            size: OrderSize::Notional(2_000.0),
            reason: "seed position".into(),
        })
        .await
        .unwrap();

    let risk = RiskConfig {
        max_trade_notional_pct: 100.0,
        ..RiskConfig::default()
    };
    let scheduler = make_scheduler(db.clone(), market, broker, risk);

    // A BUY of 800 would push BTC exposure to ~28%, above the 25% cap
    let id = insert_grid_strategy(&db, "BTC", 90_000.0, 110_000.0, 800.0, 3, vec![]).await;
    scheduler.run_now(id).await;

    let runs = run_logs::Entity::find()
        .filter(run_logs::Column::StrategyId.eq(id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].outcome, "VETOED");
    assert_eq!(runs[0].detail.as_deref(), Some("exposure_cap"));

    // No second trade, but the signal is on record with its conviction
    assert_eq!(trades::Entity::find().all(&db).await.unwrap().len(), 1);
    let stored_signals = signals::Entity::find()
        .filter(signals::Column::StrategyId.eq(id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(stored_signals.len(), 1);
    assert_eq!(stored_signals[0].action, "BUY");
}

#[tokio::test]
async fn test_hard_drawdown_trips_breaker_then_blocks_sells() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 200_000.0);
    market.set_price("ETH", 980.0);
    let broker = make_broker(db.clone(), market.clone(), 10_000.0).await;

    // Buy high, then mark the book down ~31% from its high-water mark
    broker
        .execute(Order {
            strategy_id: 0,
            symbol: "BTC".into(),
            side: Side::Buy,
            size: OrderSize::Notional(6_000.0),
            reason: "seed position".into(),
        })
        .await
        .unwrap();
    market.set_price("BTC", 98_000.0);

    let risk = RiskConfig {
        max_trade_notional_pct: 100.0,
        max_symbol_exposure_pct: 100.0,
        ..RiskConfig::default()
    };
    let scheduler = make_scheduler(db.clone(), market, broker, risk);

    // Proposed BUY on ETH: drawdown check fires and trips the breaker
    let eth = insert_grid_strategy(&db, "ETH", 900.0, 1_100.0, 100.0, 3, vec![]).await;
    scheduler.run_now(eth).await;

    let eth_runs = run_logs::Entity::find()
        .filter(run_logs::Column::StrategyId.eq(eth))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(eth_runs[0].outcome, "VETOED");
    assert_eq!(eth_runs[0].detail.as_deref(), Some("drawdown_hard"));

    let row = account::Entity::find_by_id(1).one(&db).await.unwrap().unwrap();
    assert!(row.circuit_breaker_active);
    assert_eq!(row.circuit_breaker_reason.as_deref(), Some("drawdown_hard"));

    // With the breaker set even a SELL is vetoed, with the breaker reason
    let btc = insert_grid_strategy(&db, "BTC", 90_000.0, 110_000.0, 1_000.0, 0, vec![0.01]).await;
    scheduler.run_now(btc).await;

    let btc_runs = run_logs::Entity::find()
        .filter(run_logs::Column::StrategyId.eq(btc))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(btc_runs[0].outcome, "VETOED");
    assert_eq!(btc_runs[0].detail.as_deref(), Some("circuit_breaker"));

    // Only the seed trade ever executed
    assert_eq!(trades::Entity::find().all(&db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_runs_are_serialized_and_ordered() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 103_000.0);
    let broker = make_broker(db.clone(), market.clone(), 10_000.0).await;
    let scheduler = make_scheduler(db.clone(), market, broker, permissive_risk());

    // Price stays inside the seeded cell: both runs hold
    let id = insert_grid_strategy(&db, "BTC", 90_000.0, 110_000.0, 1_000.0, 3, vec![]).await;
    scheduler.run_now(id).await;
    scheduler.run_now(id).await;

    let runs = run_logs::Entity::find()
        .filter(run_logs::Column::StrategyId.eq(id))
        .order_by_asc(run_logs::Column::StartedAt)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs[0].started_at < runs[1].started_at);
    // Consecutive runs never overlap
    assert!(runs[0].finished_at.unwrap() <= runs[1].started_at);

    for run in &runs {
        assert_eq!(run.outcome, "OK");
        let steps = trace_steps::Entity::find()
            .filter(trace_steps::Column::RunId.eq(run.id))
            .order_by_asc(trace_steps::Column::StepIndex)
            .all(&db)
            .await
            .unwrap();
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step.step_index, i as i32 + 1);
        }
    }

    let model = strategies::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();
    assert!(model.last_run_at.is_some());
}

#[tokio::test]
async fn test_three_failures_park_the_strategy() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    let broker = make_broker(db.clone(), market.clone(), 10_000.0).await;
    let scheduler = make_scheduler(db.clone(), market, broker, permissive_risk());

    // Invalid thresholds make every evaluation fail
    let model = strategies::ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        name: Set("broken-ta".into()),
        kind: Set("TA".into()),
        symbol: Set("BTC".into()),
        status: Set("ACTIVE".into()),
        schedule_interval_s: Set(60),
        parameters: Set(json!({
            "timeframes": ["1h"],
            "buy_threshold": 30.0,
            "sell_threshold": 60.0,
        })),
        last_run_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(&db)
    .await
    .unwrap();

    for _ in 0..3 {
        scheduler.run_now(model.id).await;
    }

    let runs = run_logs::Entity::find()
        .filter(run_logs::Column::StrategyId.eq(model.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(runs.len(), 3);
    assert!(runs.iter().all(|r| r.outcome == "FAILED"));

    let stored = strategies::Entity::find_by_id(model.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.status, "ERROR");

    // Once parked, further ticks are skipped entirely
    scheduler.run_now(model.id).await;
    let runs_after = run_logs::Entity::find()
        .filter(run_logs::Column::StrategyId.eq(model.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(runs_after.len(), 3);
}

#[tokio::test]
async fn test_grid_pauses_out_of_range() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 130_000.0);
    let broker = make_broker(db.clone(), market.clone(), 10_000.0).await;
    let scheduler = make_scheduler(db.clone(), market, broker, permissive_risk());

    let id = insert_grid_strategy(&db, "BTC", 90_000.0, 110_000.0, 1_000.0, 3, vec![]).await;
    scheduler.run_now(id).await;

    let stored = strategies::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.status, "PAUSED");
    let runs = run_logs::Entity::find()
        .filter(run_logs::Column::StrategyId.eq(id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(runs[0].outcome, "OK");
    assert_eq!(runs[0].detail.as_deref(), Some("grid_out_of_range"));
}
