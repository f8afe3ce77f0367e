//! Seed data script - populates the database with realistic demo data
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - 4 customers with Angolan contact details
//! - contact profiles for two of them
//! - existing domains and hosting services
//! - 2 paid orders with line items and invoices
//!
//! When APP__JWT_SECRET is set, a demo bearer token is printed for each
//! customer so the checkout endpoints can be exercised immediately.

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use std::time::Duration as StdDuration;
use tracing::info;
use uuid::Uuid;

use angohost_api::auth;
use angohost_api::entities::{
    contact_profile, customer, domain, hosting_service, invoice, order, order_item,
};
use migrations::{Migrator, MigratorTrait};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== AngoHost Storefront Seed Data ===");

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://angohost.db?mode=rwc".to_string());

    let mut options = ConnectOptions::new(database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(StdDuration::from_secs(10))
        .acquire_timeout(StdDuration::from_secs(10));

    info!("Connecting to database: {}", database_url);
    let db = Database::connect(options).await?;

    Migrator::up(&db, None).await?;

    info!("Creating customers...");
    let customers = create_customers(&db).await?;
    info!("  Created {} customers", customers.len());

    info!("Creating contact profiles...");
    let profile_count = create_profiles(&db, &customers).await?;
    info!("  Created {} profiles", profile_count);

    info!("Creating existing services...");
    let service_count = create_services(&db, &customers).await?;
    info!("  Created {} domains and hosting services", service_count);

    info!("Creating paid orders...");
    let order_count = create_paid_orders(&db, &customers).await?;
    info!("  Created {} orders with items and invoices", order_count);

    info!("");
    info!("=== Seed Data Complete ===");
    info!("Try these API calls:");
    info!("  curl http://localhost:8080/api/v1/pricing/domains?name=exemplo&extension=ao");
    info!("  curl http://localhost:8080/api/v1/orders -H 'Authorization: Bearer <token>'");
    info!("Or explore interactively at: http://localhost:8080/swagger-ui");

    if let Ok(secret) = std::env::var("APP__JWT_SECRET") {
        info!("");
        info!("Demo tokens (valid 24h):");
        for c in &customers {
            let token = auth::issue_token(
                c.id,
                Some(c.name.clone()),
                Some(c.email.clone()),
                &secret,
                86_400,
            )?;
            info!("  {} <{}>", c.name, c.email);
            info!("    {}", token);
        }
    } else {
        info!("");
        info!("Set APP__JWT_SECRET to also print demo bearer tokens.");
    }

    Ok(())
}

async fn create_customers(
    db: &sea_orm::DatabaseConnection,
) -> anyhow::Result<Vec<customer::Model>> {
    let customers_data = vec![
        ("Ana Domingos", "ana.domingos@exemplo.ao", Some("+244 923 100 001")),
        ("Carlos Mateus", "carlos.mateus@exemplo.ao", Some("+244 923 100 002")),
        ("Luisa Fernandes", "luisa.fernandes@exemplo.ao", Some("+244 933 100 003")),
        ("Miguel dos Santos", "miguel.santos@exemplo.ao", None),
    ];

    let mut created = Vec::new();
    let now = Utc::now();

    for (name, email, phone) in customers_data {
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            phone: Set(phone.map(|p| p.to_string())),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(db)
        .await?;
        created.push(model);
    }

    Ok(created)
}

async fn create_profiles(
    db: &sea_orm::DatabaseConnection,
    customers: &[customer::Model],
) -> anyhow::Result<usize> {
    let now = Utc::now();
    let mut count = 0;

    // Registrant profiles for the first two customers only, so the
    // remaining accounts demonstrate the checkout gate.
    for c in customers.iter().take(2) {
        contact_profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(c.id),
            name: Set(c.name.clone()),
            email: Set(c.email.clone()),
            phone: Set(c.phone.clone().unwrap_or_else(|| "+244 900 000 000".to_string())),
            address: Set(Some("Rua Amilcar Cabral 27".to_string())),
            city: Set(Some("Luanda".to_string())),
            country: Set("AO".to_string()),
            nif: Set(Some(format!("54171234{}LA04{}", count, count))),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(db)
        .await?;
        count += 1;
    }

    Ok(count)
}

async fn create_services(
    db: &sea_orm::DatabaseConnection,
    customers: &[customer::Model],
) -> anyhow::Result<usize> {
    let now = Utc::now();
    let mut count = 0;

    // Carlos already owns a domain, so hosting-only purchases for it
    // skip the registrant profile requirement.
    let carlos = &customers[1];
    domain::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(carlos.id),
        domain_name: Set("mateus.co.ao".to_string()),
        status: Set("active".to_string()),
        registered_at: Set(Some(now - Duration::days(200))),
        expires_at: Set(Some(now + Duration::days(165))),
        created_at: Set(now - Duration::days(200)),
    }
    .insert(db)
    .await?;
    count += 1;

    // Luisa runs a site on managed hosting.
    let luisa = &customers[2];
    domain::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(luisa.id),
        domain_name: Set("fernandes.ao".to_string()),
        status: Set("active".to_string()),
        registered_at: Set(Some(now - Duration::days(400))),
        expires_at: Set(Some(now - Duration::days(35))),
        created_at: Set(now - Duration::days(400)),
    }
    .insert(db)
    .await?;
    count += 1;

    hosting_service::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(luisa.id),
        plan: Set("Plano M".to_string()),
        domain_name: Set(Some("fernandes.ao".to_string())),
        status: Set("active".to_string()),
        next_due_date: Set(Some(now + Duration::days(330))),
        created_at: Set(now - Duration::days(400)),
    }
    .insert(db)
    .await?;
    count += 1;

    Ok(count)
}

async fn create_paid_orders(
    db: &sea_orm::DatabaseConnection,
    customers: &[customer::Model],
) -> anyhow::Result<usize> {
    let now = Utc::now();
    let mut count = 0;

    // (customer index, days ago, method, lines)
    // Line tuple: (product id, name, type, price AOA, period, details)
    let scenarios = vec![
        (
            1usize,
            200i64,
            "emis",
            vec![(
                "domain-mateus.co.ao",
                "mateus.co.ao",
                "domain",
                5_000i64,
                "yearly",
                serde_json::json!({"domainName": "mateus.co.ao", "requiresTitularity": true}),
            )],
        ),
        (
            2usize,
            400i64,
            "bank_transfer",
            vec![
                (
                    "domain-fernandes.ao",
                    "fernandes.ao",
                    "domain",
                    25_000i64,
                    "yearly",
                    serde_json::json!({"domainName": "fernandes.ao", "requiresTitularity": true}),
                ),
                (
                    "hosting-plano-m",
                    "Plano M",
                    "hosting",
                    15_000i64,
                    "yearly",
                    serde_json::json!({"existingDomain": false}),
                ),
            ],
        ),
    ];

    for (customer_idx, days_ago, method, lines) in scenarios {
        let c = &customers[customer_idx];
        let placed_at = now - Duration::days(days_ago);
        let order_id = Uuid::new_v4();
        let reference = format!("AH-{}-SEED", placed_at.timestamp_millis());
        let total: i64 = lines.iter().map(|l| l.3).sum();

        order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(c.id),
            reference: Set(reference.clone()),
            status: Set("completed".to_string()),
            payment_method: Set(method.to_string()),
            payment_id: Set(Some(format!("TX-SEED-{}", count))),
            total_amount: Set(total),
            currency: Set("AOA".to_string()),
            created_at: Set(placed_at),
            updated_at: Set(Some(placed_at)),
        }
        .insert(db)
        .await?;

        for (product_id, name, kind, price, period, details) in lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product_id.to_string()),
                product_name: Set(name.to_string()),
                product_type: Set(kind.to_string()),
                price: Set(price),
                period: Set(period.to_string()),
                details: Set(Some(details)),
                created_at: Set(placed_at),
            }
            .insert(db)
            .await?;
        }

        invoice::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            customer_id: Set(c.id),
            invoice_number: Set(format!("INV-{}", reference)),
            amount: Set(total),
            currency: Set("AOA".to_string()),
            status: Set(invoice::InvoiceStatus::Paid),
            paid_date: Set(Some(placed_at)),
            due_date: Set(placed_at + Duration::days(3)),
            created_at: Set(placed_at),
            updated_at: Set(None),
        }
        .insert(db)
        .await?;

        count += 1;
    }

    Ok(count)
}
