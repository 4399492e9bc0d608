//! Serve command implementation.

use mediasync_server::{GatewayConfig, SyncGateway};
use mediasync_storage::{FileStore, InMemoryStore, KvStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Where the gateway keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backing {
    /// One file per key under a directory.
    Directory(PathBuf),
    /// Process memory; lost on exit.
    Memory,
}

impl Backing {
    /// Opens the store.
    pub fn open(&self) -> Result<Arc<dyn KvStore>, Box<dyn std::error::Error>> {
        Ok(match self {
            Backing::Directory(dir) => Arc::new(FileStore::open(dir)?),
            Backing::Memory => Arc::new(InMemoryStore::new()),
        })
    }
}

/// Runs the gateway until Ctrl-C.
pub fn run(bind: Option<SocketAddr>, backing: Backing) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = GatewayConfig::from_env()?;
    if let Some(addr) = bind {
        config = config.with_bind_addr(addr);
    }
    let store = backing.open()?;

    info!(
        backing = ?backing,
        prefixes = config.key_policy.prefixes().len(),
        max_body = config.max_body_bytes,
        max_items = config.max_items,
        read_key = config.read_key.is_some(),
        "starting gateway"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let gateway = SyncGateway::bind(config, Some(store)).await?;
        println!("Listening on http://{}", gateway.local_addr());
        gateway.serve().await
    })?;
    Ok(())
}
