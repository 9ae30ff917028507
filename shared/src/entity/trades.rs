//! `SeaORM` Entity, written by hand

use sea_orm::entity::prelude::*;

/// Append-only ledger; never updated or deleted, and deliberately without
/// a foreign key so deleting a strategy cannot touch it
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "trades")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub strategy_id: i64,
    pub symbol: String,
    /// "BUY" or "SELL"
    pub side: String,
    pub price: f64,
    pub amount: f64,
    /// price * amount
    pub value: f64,
    pub fee: f64,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    pub executed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
