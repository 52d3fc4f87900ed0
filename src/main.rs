/*!
 * kdict - Main Entry Point
 *
 * Serves the dictionary store over newline-delimited JSON until Ctrl+C.
 */

use anyhow::Context;
use kdict::{init_tracing, serve, DictStore, ServerConfig, StoreConfig};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("kdict starting...");

    let store_config = StoreConfig::from_env().context("invalid store configuration")?;
    let server_config = ServerConfig::from_env().context("invalid server configuration")?;

    let store = DictStore::create(store_config).context("failed to create dictionary store")?;

    let listener = TcpListener::bind(server_config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", server_config.listen_addr))?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
        }
    };

    info!("Press Ctrl+C to exit");
    serve(listener, store.clone(), server_config, shutdown).await?;

    let released = store.destroy();
    info!(released, "kdict stopped");
    Ok(())
}
