use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContactProfiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContactProfiles::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContactProfiles::CustomerId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ContactProfiles::Name).string().not_null())
                    .col(ColumnDef::new(ContactProfiles::Email).string().not_null())
                    .col(ColumnDef::new(ContactProfiles::Phone).string().not_null())
                    .col(ColumnDef::new(ContactProfiles::Address).string().null())
                    .col(ColumnDef::new(ContactProfiles::City).string().null())
                    .col(
                        ColumnDef::new(ContactProfiles::Country)
                            .string()
                            .not_null()
                            .default("AO"),
                    )
                    .col(ColumnDef::new(ContactProfiles::Nif).string().null())
                    .col(
                        ColumnDef::new(ContactProfiles::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContactProfiles::UpdatedAt)
                            .timestamp()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contact_profiles_customer_id")
                            .from(ContactProfiles::Table, ContactProfiles::CustomerId)
                            .to(
                                super::m20240301_000001_create_customers_table::Customers::Table,
                                super::m20240301_000001_create_customers_table::Customers::Id,
                            )
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContactProfiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ContactProfiles {
    Table,
    Id,
    CustomerId,
    Name,
    Email,
    Phone,
    Address,
    City,
    Country,
    Nif,
    CreatedAt,
    UpdatedAt,
}
