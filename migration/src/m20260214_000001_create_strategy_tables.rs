use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Strategies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Strategies::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Strategies::Name).string().not_null())
                    .col(ColumnDef::new(Strategies::Kind).string().not_null())
                    .col(ColumnDef::new(Strategies::Symbol).string().not_null())
                    .col(
                        ColumnDef::new(Strategies::Status)
                            .string()
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(
                        ColumnDef::new(Strategies::ScheduleIntervalS)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Strategies::Parameters).json().not_null())
                    .col(ColumnDef::new(Strategies::LastRunAt).timestamp().null())
                    .col(ColumnDef::new(Strategies::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Signals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Signals::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Signals::StrategyId).big_integer().not_null())
                    .col(ColumnDef::new(Signals::Symbol).string().not_null())
                    .col(ColumnDef::new(Signals::Action).string().not_null())
                    .col(ColumnDef::new(Signals::Conviction).double().not_null())
                    .col(ColumnDef::new(Signals::PriceAtSignal).double().null())
                    .col(ColumnDef::new(Signals::Reason).text().not_null())
                    .col(ColumnDef::new(Signals::RawAnalysis).json().not_null())
                    .col(ColumnDef::new(Signals::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_signals_strategy")
                            .from(Signals::Table, Signals::StrategyId)
                            .to(Strategies::Table, Strategies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_signals_strategy_created")
                    .table(Signals::Table)
                    .col(Signals::StrategyId)
                    .col(Signals::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RunLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RunLogs::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RunLogs::StrategyId).big_integer().not_null())
                    .col(ColumnDef::new(RunLogs::StartedAt).timestamp().not_null())
                    .col(ColumnDef::new(RunLogs::FinishedAt).timestamp().null())
                    .col(
                        ColumnDef::new(RunLogs::Outcome)
                            .string()
                            .not_null()
                            .default("OK"),
                    )
                    .col(ColumnDef::new(RunLogs::Detail).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_run_logs_strategy")
                            .from(RunLogs::Table, RunLogs::StrategyId)
                            .to(Strategies::Table, Strategies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_run_logs_strategy_started")
                    .table(RunLogs::Table)
                    .col(RunLogs::StrategyId)
                    .col(RunLogs::StartedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TraceSteps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TraceSteps::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TraceSteps::RunId).big_integer().not_null())
                    .col(ColumnDef::new(TraceSteps::StepIndex).integer().not_null())
                    .col(ColumnDef::new(TraceSteps::Kind).string().not_null())
                    .col(ColumnDef::new(TraceSteps::Label).string().not_null())
                    .col(ColumnDef::new(TraceSteps::InputDigest).string().not_null())
                    .col(ColumnDef::new(TraceSteps::OutputDigest).string().not_null())
                    .col(ColumnDef::new(TraceSteps::Details).json().not_null())
                    .col(ColumnDef::new(TraceSteps::DurationMs).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trace_steps_run")
                            .from(TraceSteps::Table, TraceSteps::RunId)
                            .to(RunLogs::Table, RunLogs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_trace_steps_run")
                    .table(TraceSteps::Table)
                    .col(TraceSteps::RunId)
                    .col(TraceSteps::StepIndex)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TraceSteps::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RunLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Signals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Strategies::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Strategies {
    Table,
    Id,
    Name,
    Kind,
    Symbol,
    Status,
    ScheduleIntervalS,
    Parameters,
    LastRunAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Signals {
    Table,
    Id,
    StrategyId,
    Symbol,
    Action,
    Conviction,
    PriceAtSignal,
    Reason,
    RawAnalysis,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RunLogs {
    Table,
    Id,
    StrategyId,
    StartedAt,
    FinishedAt,
    Outcome,
    Detail,
}

#[derive(DeriveIden)]
enum TraceSteps {
    Table,
    Id,
    RunId,
    StepIndex,
    Kind,
    Label,
    InputDigest,
    OutputDigest,
    Details,
    DurationMs,
}
