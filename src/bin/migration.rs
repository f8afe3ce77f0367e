//! Standalone migration runner for the storefront schema.
//!
//! The API binary applies pending migrations at startup when
//! `APP__AUTO_MIGRATE` is set; this tool covers the operational cases
//! (rollback, fresh rebuild, status) that should never run implicitly.

use clap::{Parser, Subcommand};
use migrations::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "migration", about = "Manage the AngoHost storefront database schema")]
struct Cli {
    /// Connection string; falls back to DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations
    Up {
        /// Apply at most N migrations
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        /// Roll back at most N migrations (default 1)
        #[arg(long, default_value = "1")]
        steps: u32,
    },
    /// Drop every table and re-apply all migrations
    Fresh,
    /// Show applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let database_url = match cli.database_url {
        Some(url) => url,
        None => std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://angohost.db?mode=rwc".to_string()),
    };

    info!("Connecting to database: {}", database_url);

    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;

    match cli.command {
        Command::Up { steps } => {
            Migrator::up(&db, steps).await?;
            info!("Migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&db, Some(steps)).await?;
            info!("Rolled back {} migration(s)", steps);
        }
        Command::Fresh => {
            Migrator::fresh(&db).await?;
            info!("Schema rebuilt from scratch");
        }
        Command::Status => {
            Migrator::status(&db).await?;
        }
    }

    Ok(())
}
