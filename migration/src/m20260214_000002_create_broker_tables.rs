use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Account::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Account::Id)
                            .integer()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Account::Cash).double().not_null())
                    .col(
                        ColumnDef::new(Account::EquityHighWaterMark)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Account::CircuitBreakerActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Account::CircuitBreakerReason).text().null())
                    .col(ColumnDef::new(Account::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Positions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Positions::Symbol)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Positions::Amount).double().not_null())
                    .col(ColumnDef::new(Positions::AverageCost).double().not_null())
                    .col(ColumnDef::new(Positions::OpenedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Positions::LastUpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // No foreign key on strategy_id: the ledger is immutable and must
        // survive strategy deletion
        manager
            .create_table(
                Table::create()
                    .table(Trades::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Trades::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Trades::StrategyId).big_integer().not_null())
                    .col(ColumnDef::new(Trades::Symbol).string().not_null())
                    .col(ColumnDef::new(Trades::Side).string().not_null())
                    .col(ColumnDef::new(Trades::Price).double().not_null())
                    .col(ColumnDef::new(Trades::Amount).double().not_null())
                    .col(ColumnDef::new(Trades::Value).double().not_null())
                    .col(ColumnDef::new(Trades::Fee).double().not_null())
                    .col(ColumnDef::new(Trades::Reason).text().not_null())
                    .col(ColumnDef::new(Trades::ExecutedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_trades_strategy_executed")
                    .table(Trades::Table)
                    .col(Trades::StrategyId)
                    .col(Trades::ExecutedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Trades::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Positions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Account::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Account {
    Table,
    Id,
    Cash,
    EquityHighWaterMark,
    CircuitBreakerActive,
    CircuitBreakerReason,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Positions {
    Table,
    Symbol,
    Amount,
    AverageCost,
    OpenedAt,
    LastUpdatedAt,
}

#[derive(DeriveIden)]
enum Trades {
    Table,
    Id,
    StrategyId,
    Symbol,
    Side,
    Price,
    Amount,
    Value,
    Fee,
    Reason,
    ExecutedAt,
}
