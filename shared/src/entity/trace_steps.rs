//! `SeaORM` Entity, written by hand

use sea_orm::entity::prelude::*;

/// Ordered within a run; indices are dense and 1-based
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "trace_steps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub run_id: i64,
    pub step_index: i32,
    /// "FETCH", "COMPUTE", "SCORE", "LLM" or "ORDER"
    pub kind: String,
    pub label: String,
    pub input_digest: String,
    pub output_digest: String,
    pub details: Json,
    pub duration_ms: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::run_logs::Entity",
        from = "Column::RunId",
        to = "super::run_logs::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    RunLogs,
}

impl Related<super::run_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RunLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
