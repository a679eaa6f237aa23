use ordis::server::{Server, ServerConfig};
use ordis::storage::MemoryStore;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("loading config from {}", path);
            ServerConfig::from_file(&path)?
        }
        None => ServerConfig::default(),
    };

    if config.daemonize {
        warn!("daemonize is not supported; running in the foreground");
    }

    let store = Arc::new(MemoryStore::new());
    let server = Server::bind(config, store).await?;
    server.run().await
}
