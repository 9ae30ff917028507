//! Operations consumed by the administration surface
//!
//! The HTTP layer is deployed separately; these are the contracts it
//! calls: strategy CRUD with parameter validation, lifecycle transitions,
//! manual runs, circuit breaker reset, watched instruments, and the
//! read-side listings.

use crate::repositories::StrategyRepository;
use crate::scheduler::StrategyScheduler;
use crate::services::PaperBroker;
use anyhow::{anyhow, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use shared::entity::{run_logs, signals, strategies, trace_steps, trades, watched_instruments};
use std::sync::Arc;
use tidetrader_core::broker::AccountSnapshot;
use tidetrader_core::strategy::{validate_parameters, StrategyKind, StrategyStatus};
use tracing::info;

pub struct AdminService {
    db: DatabaseConnection,
    strategies: StrategyRepository,
    broker: Arc<PaperBroker>,
    scheduler: Arc<StrategyScheduler>,
}

impl AdminService {
    pub fn new(
        db: DatabaseConnection,
        broker: Arc<PaperBroker>,
        scheduler: Arc<StrategyScheduler>,
    ) -> Self {
        Self {
            strategies: StrategyRepository::new(db.clone()),
            db,
            broker,
            scheduler,
        }
    }

    /// Create a strategy; parameters are validated against the kind before
    /// anything is stored
    pub async fn create_strategy(
        &self,
        name: &str,
        kind: StrategyKind,
        symbol: &str,
        schedule_interval_s: i64,
        parameters: serde_json::Value,
    ) -> Result<strategies::Model> {
        if schedule_interval_s < 1 {
            return Err(anyhow!("schedule interval must be at least one second"));
        }
        validate_parameters(kind, &parameters).map_err(|e| anyhow!(e.to_string()))?;

        let model = strategies::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            name: Set(name.to_string()),
            kind: Set(kind.as_str().to_string()),
            symbol: Set(symbol.to_uppercase()),
            status: Set(StrategyStatus::Active.as_str().to_string()),
            schedule_interval_s: Set(schedule_interval_s),
            parameters: Set(parameters),
            last_run_at: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;

        info!(id = model.id, name, kind = %kind, "strategy created");
        self.scheduler
            .schedule(model.id, schedule_interval_s as u64)
            .await;
        Ok(model)
    }

    /// Update a strategy's parameter blob, re-validated against its kind
    pub async fn update_parameters(&self, id: i64, parameters: serde_json::Value) -> Result<()> {
        let model = self
            .strategies
            .get(id)
            .await?
            .ok_or_else(|| anyhow!("strategy {} not found", id))?;
        let kind: StrategyKind = model.kind.parse().map_err(|e: String| anyhow!(e))?;
        validate_parameters(kind, &parameters).map_err(|e| anyhow!(e.to_string()))?;
        self.strategies.update_parameters(id, parameters).await
    }

    pub async fn pause(&self, id: i64) -> Result<()> {
        self.strategies.set_status(id, StrategyStatus::Paused).await
    }

    pub async fn resume(&self, id: i64) -> Result<()> {
        self.scheduler.reactivate(id).await
    }

    pub async fn stop(&self, id: i64) -> Result<()> {
        self.strategies.set_status(id, StrategyStatus::Stopped).await
    }

    /// Delete a strategy; run logs and signals cascade, the trade ledger
    /// stays
    pub async fn delete_strategy(&self, id: i64) -> Result<()> {
        strategies::Entity::delete_by_id(id).exec(&self.db).await?;
        info!(id, "strategy deleted");
        Ok(())
    }

    /// Immediate tick, through the regular per-strategy lock
    pub async fn run_now(&self, id: i64) {
        self.scheduler.run_now(id).await;
    }

    pub async fn reset_circuit_breaker(&self) -> Result<()> {
        self.broker.reset_circuit_breaker().await
    }

    pub async fn account_snapshot(&self) -> AccountSnapshot {
        self.broker.snapshot().await
    }

    pub async fn watch_instrument(&self, symbol: &str, display_name: &str) -> Result<()> {
        watched_instruments::ActiveModel {
            symbol: Set(symbol.to_uppercase()),
            display_name: Set(display_name.to_string()),
            added_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    pub async fn unwatch_instrument(&self, symbol: &str) -> Result<()> {
        watched_instruments::Entity::delete_by_id(symbol.to_uppercase())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn list_strategies(&self) -> Result<Vec<strategies::Model>> {
        self.strategies.all().await
    }

    pub async fn list_trades(&self, limit: u64) -> Result<Vec<trades::Model>> {
        Ok(trades::Entity::find()
            .order_by_desc(trades::Column::ExecutedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn list_signals(&self, strategy_id: i64, limit: u64) -> Result<Vec<signals::Model>> {
        Ok(signals::Entity::find()
            .filter(signals::Column::StrategyId.eq(strategy_id))
            .order_by_desc(signals::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn list_runs(&self, strategy_id: i64, limit: u64) -> Result<Vec<run_logs::Model>> {
        Ok(run_logs::Entity::find()
            .filter(run_logs::Column::StrategyId.eq(strategy_id))
            .order_by_desc(run_logs::Column::StartedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// Ordered trace of one run
    pub async fn run_trace(&self, run_id: i64) -> Result<Vec<trace_steps::Model>> {
        Ok(trace_steps::Entity::find()
            .filter(trace_steps::Column::RunId.eq(run_id))
            .order_by_asc(trace_steps::Column::StepIndex)
            .all(&self.db)
            .await?)
    }
}
