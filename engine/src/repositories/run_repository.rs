//! Run log, trace step and signal persistence

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, TransactionTrait,
};
use shared::entity::{run_logs, signals, trace_steps};
use tidetrader_core::strategy::{Decision, RunOutcome, TraceStep};

#[derive(Clone)]
pub struct RunRepository {
    db: DatabaseConnection,
}

impl RunRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open a run log with a provisional OK outcome
    pub async fn open_run(&self, strategy_id: i64, started_at: DateTime<Utc>) -> Result<i64> {
        let row = run_logs::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            strategy_id: Set(strategy_id),
            started_at: Set(started_at),
            finished_at: Set(None),
            outcome: Set(RunOutcome::Ok.as_str().to_string()),
            detail: Set(None),
        }
        .insert(&self.db)
        .await?;
        Ok(row.id)
    }

    /// Close a run and persist its trace in one transaction
    pub async fn close_run(
        &self,
        run_id: i64,
        outcome: RunOutcome,
        detail: Option<String>,
        steps: Vec<TraceStep>,
    ) -> Result<()> {
        let txn = self.db.begin().await?;

        run_logs::ActiveModel {
            id: Set(run_id),
            finished_at: Set(Some(Utc::now())),
            outcome: Set(outcome.as_str().to_string()),
            detail: Set(detail),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        if !steps.is_empty() {
            let models: Vec<trace_steps::ActiveModel> = steps
                .into_iter()
                .map(|step| trace_steps::ActiveModel {
                    id: sea_orm::ActiveValue::NotSet,
                    run_id: Set(run_id),
                    step_index: Set(step.step_index as i32),
                    kind: Set(step.kind.as_str().to_string()),
                    label: Set(step.label),
                    input_digest: Set(step.input_digest),
                    output_digest: Set(step.output_digest),
                    details: Set(step.details),
                    duration_ms: Set(step.duration.as_millis() as i64),
                })
                .collect();
            trace_steps::Entity::insert_many(models).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Every run writes a signal, traded or not
    pub async fn insert_signal(
        &self,
        strategy_id: i64,
        symbol: &str,
        decision: &Decision,
        price_at_signal: Option<f64>,
        raw_analysis: serde_json::Value,
    ) -> Result<()> {
        signals::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            strategy_id: Set(strategy_id),
            symbol: Set(symbol.to_string()),
            action: Set(decision.action.as_str().to_string()),
            conviction: Set(decision.conviction),
            price_at_signal: Set(price_at_signal),
            reason: Set(decision.reason.clone()),
            raw_analysis: Set(raw_analysis),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    /// Close runs left open by a crash or a forced shutdown
    pub async fn close_orphan_runs(&self, reason: &str) -> Result<u64> {
        let result = run_logs::Entity::update_many()
            .col_expr(
                run_logs::Column::Outcome,
                sea_orm::sea_query::Expr::value(RunOutcome::Failed.as_str()),
            )
            .col_expr(
                run_logs::Column::FinishedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .col_expr(
                run_logs::Column::Detail,
                sea_orm::sea_query::Expr::value(reason),
            )
            .filter(run_logs::Column::FinishedAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
