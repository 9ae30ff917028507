pub use sea_orm_migration::prelude::*;

mod m20260214_000001_create_strategy_tables;
mod m20260214_000002_create_broker_tables;
mod m20260214_000003_create_market_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260214_000001_create_strategy_tables::Migration),
            Box::new(m20260214_000002_create_broker_tables::Migration),
            Box::new(m20260214_000003_create_market_tables::Migration),
        ]
    }
}
