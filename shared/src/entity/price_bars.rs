//! `SeaORM` Entity, written by hand

use sea_orm::entity::prelude::*;

/// Locally persisted kline history; unique on (symbol, timeframe, open_time)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "price_bars")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub symbol: String,
    /// "1m", "5m", "15m", "1h", "4h" or "1d"
    pub timeframe: String,
    pub open_time: DateTimeUtc,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
