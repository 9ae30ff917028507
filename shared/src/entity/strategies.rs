//! `SeaORM` Entity, written by hand

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "strategies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// "TA", "MACRO" or "GRID"
    pub kind: String,
    pub symbol: String,
    /// "ACTIVE", "PAUSED", "STOPPED" or "ERROR"
    pub status: String,
    /// Tick cadence in seconds
    pub schedule_interval_s: i64,
    /// Kind-specific parameter blob, opaque to the scheduler
    pub parameters: Json,
    pub last_run_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::run_logs::Entity")]
    RunLogs,
    #[sea_orm(has_many = "super::signals::Entity")]
    Signals,
}

impl Related<super::run_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RunLogs.def()
    }
}

impl Related<super::signals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Signals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
