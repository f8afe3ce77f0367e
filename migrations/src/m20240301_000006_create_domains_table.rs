use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Domains::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Domains::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Domains::CustomerId).uuid().not_null())
                    .col(
                        ColumnDef::new(Domains::DomainName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Domains::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Domains::RegisteredAt).timestamp().null())
                    .col(ColumnDef::new(Domains::ExpiresAt).timestamp().null())
                    .col(ColumnDef::new(Domains::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Domains::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Domains {
    Table,
    Id,
    CustomerId,
    DomainName,
    Status,
    RegisteredAt,
    ExpiresAt,
    CreatedAt,
}
