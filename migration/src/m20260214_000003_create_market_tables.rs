use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WatchedInstruments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WatchedInstruments::Symbol)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WatchedInstruments::DisplayName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WatchedInstruments::AddedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PriceBars::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PriceBars::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PriceBars::Symbol).string().not_null())
                    .col(ColumnDef::new(PriceBars::Timeframe).string().not_null())
                    .col(ColumnDef::new(PriceBars::OpenTime).timestamp().not_null())
                    .col(ColumnDef::new(PriceBars::Open).double().not_null())
                    .col(ColumnDef::new(PriceBars::High).double().not_null())
                    .col(ColumnDef::new(PriceBars::Low).double().not_null())
                    .col(ColumnDef::new(PriceBars::Close).double().not_null())
                    .col(ColumnDef::new(PriceBars::Volume).double().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_price_bars_symbol_tf_time")
                    .table(PriceBars::Table)
                    .col(PriceBars::Symbol)
                    .col(PriceBars::Timeframe)
                    .col(PriceBars::OpenTime)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PriceBars::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WatchedInstruments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WatchedInstruments {
    Table,
    Symbol,
    DisplayName,
    AddedAt,
}

#[derive(DeriveIden)]
enum PriceBars {
    Table,
    Id,
    Symbol,
    Timeframe,
    OpenTime,
    Open,
    High,
    Low,
    Close,
    Volume,
}
