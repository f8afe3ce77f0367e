use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HostingServices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HostingServices::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(HostingServices::CustomerId).uuid().not_null())
                    .col(ColumnDef::new(HostingServices::Plan).string().not_null())
                    .col(ColumnDef::new(HostingServices::DomainName).string().null())
                    .col(
                        ColumnDef::new(HostingServices::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(HostingServices::NextDueDate)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(HostingServices::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HostingServices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum HostingServices {
    Table,
    Id,
    CustomerId,
    Plan,
    DomainName,
    Status,
    NextDueDate,
    CreatedAt,
}
