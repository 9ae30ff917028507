//! Paper broker service against the embedded store

mod common;

use common::{setup_db, FixtureMarket};
use engine::services::{PaperBroker, PaperRoute};
use sea_orm::EntityTrait;
use shared::entity::{account, positions, trades};
use std::sync::Arc;
use tidetrader_core::broker::{FeeSchedule, Order, OrderSize, Side};

fn order(side: Side, size: OrderSize) -> Order {
    Order {
        strategy_id: 1,
        symbol: "BTC".into(),
        side,
        size,
        reason: "test order".into(),
    }
}

async fn broker_with_cash(
    db: sea_orm::DatabaseConnection,
    market: Arc<FixtureMarket>,
    cash: f64,
) -> PaperBroker {
    PaperBroker::load(db, market, FeeSchedule::default(), Arc::new(PaperRoute), cash)
        .await
        .expect("broker loads")
}

#[tokio::test]
async fn test_buy_persists_trade_position_and_account() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 98_000.0);
    let broker = broker_with_cash(db.clone(), market, 10_000.0).await;

    let fill = broker
        .execute(order(Side::Buy, OrderSize::Notional(1_000.0)))
        .await
        .unwrap();

    // Slippage-adjusted fill, grid scenario arithmetic
    let expected_amount = 1_000.0 / (98_000.0 * 1.0005);
    assert!((fill.amount - expected_amount).abs() < 1e-9);
    assert!((fill.value - 1_000.0).abs() < 1e-9);
    assert!((fill.fee - 1.0).abs() < 1e-9);

    let stored_trades = trades::Entity::find().all(&db).await.unwrap();
    assert_eq!(stored_trades.len(), 1);
    assert_eq!(stored_trades[0].side, "BUY");
    assert!((stored_trades[0].value - 1_000.0).abs() < 1e-9);

    let stored_positions = positions::Entity::find().all(&db).await.unwrap();
    assert_eq!(stored_positions.len(), 1);
    assert!((stored_positions[0].amount - expected_amount).abs() < 1e-9);

    let row = account::Entity::find_by_id(1).one(&db).await.unwrap().unwrap();
    assert!((row.cash - (10_000.0 - 1_001.0)).abs() < 1e-6);
}

#[tokio::test]
async fn test_full_close_deletes_position_row() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 50_000.0);
    let broker = broker_with_cash(db.clone(), market, 10_000.0).await;

    broker
        .execute(order(Side::Buy, OrderSize::Notional(1_000.0)))
        .await
        .unwrap();
    let closed = broker.close_all(1, "BTC", "unwinding").await.unwrap();
    assert!(closed.is_some());

    let stored_positions = positions::Entity::find().all(&db).await.unwrap();
    assert!(stored_positions.is_empty());
    // The ledger keeps both sides
    let stored_trades = trades::Entity::find().all(&db).await.unwrap();
    assert_eq!(stored_trades.len(), 2);
}

#[tokio::test]
async fn test_insufficient_cash_leaves_no_rows() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 50_000.0);
    let broker = broker_with_cash(db.clone(), market, 100.0).await;

    let err = broker
        .execute(order(Side::Buy, OrderSize::Notional(1_000.0)))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("insufficient cash"));

    assert!(trades::Entity::find().all(&db).await.unwrap().is_empty());
    let row = account::Entity::find_by_id(1).one(&db).await.unwrap().unwrap();
    assert_eq!(row.cash, 100.0);
}

#[tokio::test]
async fn test_book_restores_across_restart() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 50_000.0);

    {
        let broker = broker_with_cash(db.clone(), market.clone(), 10_000.0).await;
        broker
            .execute(order(Side::Buy, OrderSize::Notional(2_000.0)))
            .await
            .unwrap();
    }

    // A second load must see the same cash and position
    let broker = broker_with_cash(db.clone(), market, 10_000.0).await;
    let snapshot = broker.snapshot().await;
    assert!((snapshot.cash - (10_000.0 - 2_002.0)).abs() < 1e-6);
    assert_eq!(snapshot.positions.len(), 1);
    assert_eq!(snapshot.positions[0].symbol, "BTC");
}

#[tokio::test]
async fn test_snapshot_marks_equity_against_market() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    market.set_price("BTC", 50_000.0);
    let broker = broker_with_cash(db.clone(), market.clone(), 10_000.0).await;

    broker
        .execute(order(Side::Buy, OrderSize::Notional(5_000.0)))
        .await
        .unwrap();

    market.set_price("BTC", 60_000.0);
    let snapshot = broker.snapshot().await;
    // Position gained ~20%, equity must sit well above starting cash
    assert!(snapshot.equity > 10_500.0, "equity = {}", snapshot.equity);
    assert_eq!(snapshot.equity_high_water_mark, 10_000.0);
}

#[tokio::test]
async fn test_circuit_breaker_round_trips_through_store() {
    let db = setup_db().await;
    let market = Arc::new(FixtureMarket::new());
    let broker = broker_with_cash(db.clone(), market.clone(), 10_000.0).await;

    broker.set_circuit_breaker("drawdown_hard").await.unwrap();
    let row = account::Entity::find_by_id(1).one(&db).await.unwrap().unwrap();
    assert!(row.circuit_breaker_active);
    assert_eq!(row.circuit_breaker_reason.as_deref(), Some("drawdown_hard"));

    // A reloaded broker sees the breaker
    let reloaded = broker_with_cash(db.clone(), market, 10_000.0).await;
    assert!(reloaded.snapshot().await.circuit_breaker_active);

    reloaded.reset_circuit_breaker().await.unwrap();
    let row = account::Entity::find_by_id(1).one(&db).await.unwrap().unwrap();
    assert!(!row.circuit_breaker_active);
}
