//! `SeaORM` Entity, written by hand

use sea_orm::entity::prelude::*;

/// Singleton row (id = 1) created at first startup with the configured
/// initial cash; mutated only by the broker
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "account")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub cash: f64,
    pub equity_high_water_mark: f64,
    pub circuit_breaker_active: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub circuit_breaker_reason: Option<String>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
