//! nixer-sw host entry point.
//!
//! Runs the offline agent behind a JSON-lines protocol on stdio.
//! Logging goes to stderr to keep stdout reserved for replies.

use std::sync::Arc;

use anyhow::Result;
use nixer_client::{FetchClient, FetchConfig};
use nixer_core::{Agent, AgentConfig, CacheDb, MemoryStore, Store};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod clients;
mod error;
mod handler;
mod protocol;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AgentConfig::load()?;

    tracing::info!(
        cache_name = %config.cache_name,
        scope = %config.scope,
        db_path = %config.db_path.display(),
        "Starting nixer-sw host on stdio"
    );

    let store: Arc<dyn Store> = if config.in_memory() {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(CacheDb::open(&config.db_path).await?)
    };
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let clients = Arc::new(clients::ClientRegistry::new());

    let agent = Agent::new(&config, store, network, clients.clone())?;
    let host = handler::Host::new(Arc::new(agent), clients);

    handler::serve(host, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    Ok(())
}
