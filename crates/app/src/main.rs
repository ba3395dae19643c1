use std::sync::Arc;

use engine::{DocumentStore, Engine, FsDocumentStore, MemoryDocumentStore};
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let server = settings.server;
    tracing::info!(port = server.port, "Found server settings...");
    let db = parse_database(&server.database).await?;

    let max_amount = settings.ledger.amount_limit()?;
    let documents: Arc<dyn DocumentStore + Send + Sync> = match &server.documents_dir {
        Some(dir) => {
            tracing::info!(dir = %dir, "storing documents on disk");
            Arc::new(FsDocumentStore::new(dir)?)
        }
        None => {
            tracing::warn!("no documents_dir configured, attachments are kept in memory");
            Arc::new(MemoryDocumentStore::default())
        }
    };

    let engine = Engine::builder()
        .database(db)
        .document_store(documents)
        .amount_limit(max_amount)
        .build()
        .await?;

    let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    server::run_with_listener(
        server::ServerState::new(engine, settings.ledger.locale),
        listener,
    )
    .await?;

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
