//! Paper broker service
//!
//! Owns the in-memory account book and mirrors every mutation into SQLite
//! in one transaction. Mutations are serialized end-to-end by a commit
//! lock; the book lock that snapshot readers share is only ever taken to
//! clone or swap the book, never across the store write or the execution
//! route. The route seam carries the paper route and a stubbed live route
//! with identical semantics.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use shared::entity::{account, positions, trades};
use shared::models::position_lot;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tidetrader_core::broker::{
    AccountBook, AccountSnapshot, FeeSchedule, Order, TradeFill,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

const ACCOUNT_ROW_ID: i32 = 1;

/// Latest-price lookup used for fills and equity marks
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn last_price(&self, symbol: &str) -> Option<f64>;
}

/// Settlement seam. Paper routing settles nowhere; the live route is a
/// stub with identical semantics until real exchange wiring exists.
#[async_trait]
pub trait ExecutionRoute: Send + Sync {
    fn name(&self) -> &'static str;
    async fn route(&self, fill: &TradeFill) -> Result<()>;
}

pub struct PaperRoute;

#[async_trait]
impl ExecutionRoute for PaperRoute {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn route(&self, _fill: &TradeFill) -> Result<()> {
        Ok(())
    }
}

pub struct LiveRoute;

#[async_trait]
impl ExecutionRoute for LiveRoute {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn route(&self, fill: &TradeFill) -> Result<()> {
        // TODO(exchange): submit through the real order gateway once API
        // keys and order types are settled
        warn!(symbol = %fill.symbol, side = %fill.side, "live route is a stub; order not sent to any exchange");
        Ok(())
    }
}

pub struct PaperBroker {
    db: DatabaseConnection,
    feed: Arc<dyn PriceFeed>,
    fees: FeeSchedule,
    route: Arc<dyn ExecutionRoute>,
    book: Mutex<AccountBook>,
    /// Serializes mutations end-to-end so the book lock stays brief
    commit: Mutex<()>,
}

impl PaperBroker {
    /// Restore the book from the store, creating the singleton account row
    /// with the configured initial cash on first start
    pub async fn load(
        db: DatabaseConnection,
        feed: Arc<dyn PriceFeed>,
        fees: FeeSchedule,
        route: Arc<dyn ExecutionRoute>,
        initial_cash: f64,
    ) -> Result<Self> {
        let row = account::Entity::find_by_id(ACCOUNT_ROW_ID).one(&db).await?;
        let row = match row {
            Some(row) => row,
            None => {
                info!(initial_cash, "creating paper account");
                let fresh = account::ActiveModel {
                    id: Set(ACCOUNT_ROW_ID),
                    cash: Set(initial_cash),
                    equity_high_water_mark: Set(initial_cash),
                    circuit_breaker_active: Set(false),
                    circuit_breaker_reason: Set(None),
                    updated_at: Set(Utc::now()),
                };
                account::Entity::insert(fresh).exec(&db).await?;
                account::Entity::find_by_id(ACCOUNT_ROW_ID)
                    .one(&db)
                    .await?
                    .context("account row missing right after insert")?
            }
        };

        let stored_positions = positions::Entity::find().all(&db).await?;
        let lots: BTreeMap<String, _> = stored_positions
            .iter()
            .map(|p| (p.symbol.clone(), position_lot(p)))
            .collect();

        let book = AccountBook::restore(
            row.cash,
            row.equity_high_water_mark,
            row.circuit_breaker_active
                .then(|| row.circuit_breaker_reason.clone().unwrap_or_default()),
            lots,
        );

        Ok(Self {
            db,
            feed,
            fees,
            route,
            book: Mutex::new(book),
            commit: Mutex::new(()),
        })
    }

    async fn held_symbols(&self) -> Vec<String> {
        let book = self.book.lock().await;
        book.positions().map(|(s, _)| s.clone()).collect()
    }

    async fn prices_for(&self, symbols: &[String]) -> HashMap<String, f64> {
        let mut prices = HashMap::new();
        for symbol in symbols {
            if let Some(price) = self.feed.last_price(symbol).await {
                prices.insert(symbol.clone(), price);
            }
        }
        prices
    }

    /// Point-in-time view of cash, positions and equity
    pub async fn snapshot(&self) -> AccountSnapshot {
        let symbols = self.held_symbols().await;
        let prices = self.prices_for(&symbols).await;
        let book = self.book.lock().await;
        book.snapshot(|s| prices.get(s).copied())
    }

    /// Execute an order at the latest cached price. The book is mutated on
    /// a working copy and committed only after the store accepted the
    /// trade, so a persistence failure leaves memory and disk agreeing.
    pub async fn execute(&self, order: Order) -> Result<TradeFill> {
        // One mutation at a time; the commit lock, not the book lock,
        // carries the single-writer guarantee across the slow parts
        let _commit = self.commit.lock().await;

        let last_price = self
            .feed
            .last_price(&order.symbol)
            .await
            .with_context(|| format!("no market price for {}", order.symbol))?;

        let mut symbols = self.held_symbols().await;
        if !symbols.contains(&order.symbol) {
            symbols.push(order.symbol.clone());
        }
        let prices = self.prices_for(&symbols).await;

        let mut working = self.book.lock().await.clone();
        let fill = working.execute(&order, last_price, &self.fees, Utc::now())?;
        let equity = working.equity(|s| prices.get(s).copied());
        working.update_high_water_mark(equity);

        // Store first; the in-memory book only moves once the transaction
        // landed, and the book lock is not held across either await
        self.persist_trade(&working, &fill).await?;
        *self.book.lock().await = working;

        if let Err(err) = self.route.route(&fill).await {
            warn!(route = self.route.name(), error = %err, "execution route failed");
        }

        info!(
            side = %fill.side,
            symbol = %fill.symbol,
            amount = fill.amount,
            price = fill.price,
            fee = fill.fee,
            "paper trade executed"
        );
        Ok(fill)
    }

    /// Sell a position in full
    pub async fn close_all(&self, strategy_id: i64, symbol: &str, reason: &str) -> Result<Option<TradeFill>> {
        let amount = {
            let book = self.book.lock().await;
            book.position(symbol).map(|lot| lot.amount)
        };
        let Some(amount) = amount else {
            return Ok(None);
        };

        let order = Order {
            strategy_id,
            symbol: symbol.to_string(),
            side: tidetrader_core::broker::Side::Sell,
            size: tidetrader_core::broker::OrderSize::Amount(amount),
            reason: reason.to_string(),
        };
        self.execute(order).await.map(Some)
    }

    /// Trip the circuit breaker (risk filter decision)
    pub async fn set_circuit_breaker(&self, reason: &str) -> Result<()> {
        let _commit = self.commit.lock().await;
        let mut working = self.book.lock().await.clone();
        working.set_circuit_breaker(reason);
        self.persist_account(&working).await?;
        *self.book.lock().await = working;
        warn!(reason, "circuit breaker set");
        Ok(())
    }

    /// Explicit admin action; nothing else clears the breaker
    pub async fn reset_circuit_breaker(&self) -> Result<()> {
        let _commit = self.commit.lock().await;
        let mut working = self.book.lock().await.clone();
        working.clear_circuit_breaker();
        self.persist_account(&working).await?;
        *self.book.lock().await = working;
        info!("circuit breaker cleared");
        Ok(())
    }

    async fn persist_trade(&self, book: &AccountBook, fill: &TradeFill) -> Result<()> {
        let txn = self.db.begin().await?;

        trades::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            strategy_id: Set(fill.strategy_id),
            symbol: Set(fill.symbol.clone()),
            side: Set(fill.side.as_str().to_string()),
            price: Set(fill.price),
            amount: Set(fill.amount),
            value: Set(fill.value),
            fee: Set(fill.fee),
            reason: Set(fill.reason.clone()),
            executed_at: Set(fill.executed_at),
        }
        .insert(&txn)
        .await?;

        match book.position(&fill.symbol) {
            Some(lot) => {
                let model = positions::ActiveModel {
                    symbol: Set(fill.symbol.clone()),
                    amount: Set(lot.amount),
                    average_cost: Set(lot.average_cost),
                    opened_at: Set(lot.opened_at),
                    last_updated_at: Set(lot.last_updated_at),
                };
                positions::Entity::insert(model)
                    .on_conflict(
                        OnConflict::column(positions::Column::Symbol)
                            .update_columns([
                                positions::Column::Amount,
                                positions::Column::AverageCost,
                                positions::Column::LastUpdatedAt,
                            ])
                            .to_owned(),
                    )
                    .exec(&txn)
                    .await?;
            }
            None => {
                positions::Entity::delete_many()
                    .filter(positions::Column::Symbol.eq(fill.symbol.clone()))
                    .exec(&txn)
                    .await?;
            }
        }

        account::Entity::update(account::ActiveModel {
            id: Set(ACCOUNT_ROW_ID),
            cash: Set(book.cash()),
            equity_high_water_mark: Set(book.equity_high_water_mark()),
            circuit_breaker_active: Set(book.circuit_breaker_active()),
            circuit_breaker_reason: Set(book.circuit_breaker_reason().map(str::to_string)),
            updated_at: Set(Utc::now()),
        })
        .exec(&txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }

    async fn persist_account(&self, book: &AccountBook) -> Result<()> {
        account::Entity::update(account::ActiveModel {
            id: Set(ACCOUNT_ROW_ID),
            cash: Set(book.cash()),
            equity_high_water_mark: Set(book.equity_high_water_mark()),
            circuit_breaker_active: Set(book.circuit_breaker_active()),
            circuit_breaker_reason: Set(book.circuit_breaker_reason().map(str::to_string)),
            updated_at: Set(Utc::now()),
        })
        .exec(&self.db)
        .await?;
        Ok(())
    }
}
