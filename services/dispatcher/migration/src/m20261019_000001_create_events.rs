use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Events::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Events::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Events::ProjectId).uuid())
                    .col(ColumnDef::new(Events::EventType).string().not_null())
                    .col(
                        ColumnDef::new(Events::Payload)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Events::Status)
                            .string_len(16)
                            .not_null()
                            .default("new"),
                    )
                    .col(
                        ColumnDef::new(Events::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Events::SentAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Events::AckedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Events::LastError).text())
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Events::Status).is_in(["new", "sent", "failed", "acked"]))
                    .to_owned(),
            )
            .await?;

        // Dispatcher poll: status IN (new, failed) ORDER BY created_at.
        manager
            .create_index(
                Index::create()
                    .table(Events::Table)
                    .col(Events::Status)
                    .col(Events::CreatedAt)
                    .name("idx_events_status_created_at")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Events::Table)
                    .col(Events::TenantId)
                    .name("idx_events_tenant_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Events {
    Table,
    Id,
    TenantId,
    ProjectId,
    EventType,
    Payload,
    Status,
    RetryCount,
    SentAt,
    AckedAt,
    LastError,
    CreatedAt,
}
