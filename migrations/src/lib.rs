pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_customers_table;
mod m20240301_000002_create_contact_profiles_table;
mod m20240301_000003_create_orders_table;
mod m20240301_000004_create_order_items_table;
mod m20240301_000005_create_invoices_table;
mod m20240301_000006_create_domains_table;
mod m20240301_000007_create_hosting_services_table;
mod m20240301_000008_add_storefront_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_customers_table::Migration),
            Box::new(m20240301_000002_create_contact_profiles_table::Migration),
            Box::new(m20240301_000003_create_orders_table::Migration),
            Box::new(m20240301_000004_create_order_items_table::Migration),
            Box::new(m20240301_000005_create_invoices_table::Migration),
            Box::new(m20240301_000006_create_domains_table::Migration),
            Box::new(m20240301_000007_create_hosting_services_table::Migration),
            Box::new(m20240301_000008_add_storefront_indexes::Migration),
        ]
    }
}
