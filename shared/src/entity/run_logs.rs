//! `SeaORM` Entity, written by hand

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "run_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub strategy_id: i64,
    pub started_at: DateTimeUtc,
    pub finished_at: Option<DateTimeUtc>,
    /// "OK", "VETOED" or "FAILED"
    pub outcome: String,
    /// Failure or veto detail when the outcome is not OK
    #[sea_orm(column_type = "Text", nullable)]
    pub detail: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::strategies::Entity",
        from = "Column::StrategyId",
        to = "super::strategies::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Strategies,
    #[sea_orm(has_many = "super::trace_steps::Entity")]
    TraceSteps,
}

impl Related<super::strategies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Strategies.def()
    }
}

impl Related<super::trace_steps::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TraceSteps.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
