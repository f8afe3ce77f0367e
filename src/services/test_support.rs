//! Shared fixtures for service-level tests

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tokio::sync::mpsc;

use crate::events::{Event, EventSender};

/// Fresh in-memory database with the full schema applied. A single pooled
/// connection keeps the in-memory database alive for the test's lifetime.
pub async fn sqlite_db() -> Arc<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("in-memory database");
    migrations::Migrator::up(&db, None)
        .await
        .expect("schema migration");
    Arc::new(db)
}

/// Event channel pair; the receiver lets tests assert on emitted events.
pub fn event_channel() -> (Arc<EventSender>, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(64);
    (Arc::new(EventSender::new(tx)), rx)
}

/// Event sender with no consumer. The leaked receiver keeps the channel
/// open, so the buffer absorbs everything a single test emits.
pub fn detached_event_sender() -> Arc<EventSender> {
    let (tx, rx) = mpsc::channel(64);
    std::mem::forget(rx);
    Arc::new(EventSender::new(tx))
}
