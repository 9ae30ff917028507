//! Strategy row access; status transitions belong to the scheduler

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use shared::entity::strategies;
use tidetrader_core::strategy::StrategyStatus;

#[derive(Clone)]
pub struct StrategyRepository {
    db: DatabaseConnection,
}

impl StrategyRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, id: i64) -> Result<Option<strategies::Model>> {
        Ok(strategies::Entity::find_by_id(id).one(&self.db).await?)
    }

    pub async fn all(&self) -> Result<Vec<strategies::Model>> {
        Ok(strategies::Entity::find()
            .order_by_asc(strategies::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn active(&self) -> Result<Vec<strategies::Model>> {
        Ok(strategies::Entity::find()
            .filter(strategies::Column::Status.eq(StrategyStatus::Active.as_str()))
            .all(&self.db)
            .await?)
    }

    pub async fn set_status(&self, id: i64, status: StrategyStatus) -> Result<()> {
        strategies::ActiveModel {
            id: Set(id),
            status: Set(status.as_str().to_string()),
            ..Default::default()
        }
        .update(&self.db)
        .await?;
        Ok(())
    }

    pub async fn set_last_run(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        strategies::ActiveModel {
            id: Set(id),
            last_run_at: Set(Some(at)),
            ..Default::default()
        }
        .update(&self.db)
        .await?;
        Ok(())
    }

    /// Persist an evaluator-owned parameter blob update
    pub async fn update_parameters(&self, id: i64, parameters: serde_json::Value) -> Result<()> {
        strategies::ActiveModel {
            id: Set(id),
            parameters: Set(parameters),
            ..Default::default()
        }
        .update(&self.db)
        .await?;
        Ok(())
    }
}
