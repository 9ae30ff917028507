//! `SeaORM` Entity, written by hand

use sea_orm::entity::prelude::*;

/// Append-only; a signal is written on every run, traded or not
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "signals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub strategy_id: i64,
    pub symbol: String,
    /// "BUY", "SELL" or "HOLD"
    pub action: String,
    /// 0..100
    pub conviction: f64,
    pub price_at_signal: Option<f64>,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    /// Opaque structured record with the full evaluation detail
    pub raw_analysis: Json,
    pub created_at: DateTimeUtc,
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
}

impl Related<super::strategies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Strategies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
