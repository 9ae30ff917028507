//! `SeaORM` Entity, written by hand

use sea_orm::entity::prelude::*;

/// One row per symbol; rows disappear when the amount reaches zero
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "positions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub symbol: String,
    pub amount: f64,
    pub average_cost: f64,
    pub opened_at: DateTimeUtc,
    pub last_updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
