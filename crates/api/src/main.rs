use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use roomstock_infra::config::StoreConfig;
use roomstock_infra::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore};

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    roomstock_observability::init();

    let bind = std::env::var("ROOMSTOCK_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let config = StoreConfig::from_env().context("invalid store configuration")?;

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    match config.database_url.as_deref() {
        Some(url) => {
            let store = Arc::new(
                PostgresInventoryStore::connect(url, config.max_connections)
                    .await
                    .context("failed to connect to postgres")?,
            );
            if config.auto_migrate {
                store.ensure_schema().await.context("failed to create schema")?;
            }
            tracing::info!(max_connections = config.max_connections, "using postgres store");

            serve(listener, Arc::clone(&store)).await?;
            store.close().await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            serve(listener, Arc::new(InMemoryInventoryStore::new())).await?;
        }
    }

    tracing::info!("shut down");
    Ok(())
}

async fn serve<S: InventoryStore>(listener: TcpListener, store: Arc<S>) -> anyhow::Result<()> {
    let app = roomstock_api::app::build_app(store);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
