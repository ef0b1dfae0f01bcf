use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use stagepass_server::config::{Config, StorageBackend};
use stagepass_server::routes::create_routes;
use stagepass_server::state::AppState;
use stagepass_server::store::{MemoryStore, PgStore};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env()?;

    let state = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config.database_url.clone().unwrap_or_default();
            let store = PgStore::connect(&url, config.max_connections).await?;
            tracing::info!("Successfully connected to database");

            store.migrate().await?;
            tracing::info!("Migrations run successfully");

            AppState::new(store, config)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data will be lost on shutdown");
            AppState::new(MemoryStore::new(), config)
        }
    };

    let addr = state.config.bind_addr;
    let app = create_routes(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
