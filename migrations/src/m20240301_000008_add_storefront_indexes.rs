use sea_orm_migration::prelude::*;

use super::m20240301_000002_create_contact_profiles_table::ContactProfiles;
use super::m20240301_000003_create_orders_table::Orders;
use super::m20240301_000004_create_order_items_table::OrderItems;
use super::m20240301_000005_create_invoices_table::Invoices;
use super::m20240301_000006_create_domains_table::Domains;
use super::m20240301_000007_create_hosting_services_table::HostingServices;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Customer order history, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_orders_customer_created")
                    .table(Orders::Table)
                    .col(Orders::CustomerId)
                    .col((Orders::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_items_order_id")
                    .table(OrderItems::Table)
                    .col(OrderItems::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_customer_id")
                    .table(Invoices::Table)
                    .col(Invoices::CustomerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contact_profiles_customer_id")
                    .table(ContactProfiles::Table)
                    .col(ContactProfiles::CustomerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_domains_customer_id")
                    .table(Domains::Table)
                    .col(Domains::CustomerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_hosting_services_customer_id")
                    .table(HostingServices::Table)
                    .col(HostingServices::CustomerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_orders_customer_created").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_order_items_order_id").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_invoices_customer_id").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_contact_profiles_customer_id")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_domains_customer_id").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_hosting_services_customer_id")
                    .to_owned(),
            )
            .await
    }
}
