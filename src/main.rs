use ai_registry::api::routes::create_router;
use ai_registry::config::{AppConfig, StoreBackend};
use ai_registry::store::{MemoryStore, PostgresStore};
use axum::serve;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .init();

    log::info!("AI Registry: checkpoint resolution server");

    // Load configuration
    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    let app = match config.store {
        StoreBackend::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let database_url = config.database_url()?;
            let postgres_store = PostgresStore::new(&database_url).await?;

            log::info!("Running schema setup...");
            postgres_store.migrate().await?;

            create_router().with_state(Arc::new(postgres_store))
        }
        StoreBackend::Memory => {
            log::warn!("Using in-memory store; data will not survive restarts");
            create_router().with_state(Arc::new(MemoryStore::new()))
        }
    };

    run_server(app, &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("AI Registry server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
