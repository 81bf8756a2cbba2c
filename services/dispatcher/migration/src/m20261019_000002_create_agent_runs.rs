use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AgentRuns::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AgentRuns::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(AgentRuns::TenantId).uuid().not_null())
                    .col(ColumnDef::new(AgentRuns::ProjectId).uuid())
                    .col(ColumnDef::new(AgentRuns::AgentId).string())
                    .col(ColumnDef::new(AgentRuns::EventId).uuid().not_null())
                    .col(ColumnDef::new(AgentRuns::EventType).string().not_null())
                    .col(ColumnDef::new(AgentRuns::Input).json_binary().not_null())
                    .col(ColumnDef::new(AgentRuns::Output).json_binary().not_null())
                    .col(ColumnDef::new(AgentRuns::Status).string().not_null())
                    .col(ColumnDef::new(AgentRuns::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AgentRuns::FinishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AgentRuns::Error).text())
                    .col(
                        ColumnDef::new(AgentRuns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(AgentRuns::Table, AgentRuns::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(AgentRuns::Table)
                    .col(AgentRuns::EventId)
                    .name("idx_agent_runs_event_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AgentRuns::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AgentRuns {
    Table,
    Id,
    TenantId,
    ProjectId,
    AgentId,
    EventId,
    EventType,
    Input,
    Output,
    Status,
    StartedAt,
    FinishedAt,
    Error,
    CreatedAt,
}

#[derive(Iden)]
enum Events {
    Table,
    Id,
}
