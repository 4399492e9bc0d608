//! Listener lifecycle for the sync gateway.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::handler::Gateway;
use crate::http::router;
use axum::Router;
use mediasync_storage::KvStore;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A bound, not yet serving, gateway.
///
/// # Example
///
/// ```no_run
/// use mediasync_server::{GatewayConfig, SyncGateway};
/// use mediasync_storage::InMemoryStore;
/// use std::sync::Arc;
///
/// # async fn run() -> mediasync_server::GatewayResult<()> {
/// let config = GatewayConfig::default().with_api_key("secret1");
/// let handle = SyncGateway::bind(config, Some(Arc::new(InMemoryStore::new())))
///     .await?
///     .spawn();
/// println!("{}", handle.base_url());
/// handle.shutdown().await
/// # }
/// ```
pub struct SyncGateway {
    listener: TcpListener,
    app: Router,
    local_addr: SocketAddr,
}

impl SyncGateway {
    /// Binds the configured address.
    ///
    /// A missing store is allowed; every request is then answered with
    /// `Store not configured`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        config: GatewayConfig,
        store: Option<Arc<dyn KvStore>>,
    ) -> GatewayResult<Self> {
        if store.is_none() {
            warn!("no store bound; all requests will fail");
        }
        if config.api_key.is_none() {
            warn!("API_KEY is not set; all requests will be rejected");
        }

        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let gateway = Arc::new(Gateway::with_store(config, store));
        Ok(Self {
            listener,
            app: router(gateway),
            local_addr,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails.
    pub async fn serve(self) -> GatewayResult<()> {
        self.serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serves until `signal` resolves, then drains in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = %self.local_addr, "gateway listening");
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(signal)
            .await?;
        info!("gateway stopped");
        Ok(())
    }

    /// Serves on a background task.
    pub fn spawn(self) -> GatewayHandle {
        let local_addr = self.local_addr;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(self.serve_with_shutdown(async {
            let _ = shutdown_rx.await;
        }));
        GatewayHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            join,
        }
    }
}

/// Handle to a gateway serving on a background task.
pub struct GatewayHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<GatewayResult<()>>,
}

impl GatewayHandle {
    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns `http://<addr>`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Stops accepting connections and waits for the server to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the server task failed.
    pub async fn shutdown(mut self) -> GatewayResult<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        (&mut self.join)
            .await
            .map_err(|e| GatewayError::Internal(format!("server join failed: {e}")))?
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediasync_storage::InMemoryStore;

    fn local_config() -> GatewayConfig {
        GatewayConfig::default()
            .with_bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
            .with_api_key("secret1")
    }

    #[tokio::test]
    async fn bind_reports_ephemeral_port() {
        let gateway = SyncGateway::bind(local_config(), Some(Arc::new(InMemoryStore::new())))
            .await
            .unwrap();
        assert_ne!(gateway.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn spawn_and_shutdown() {
        let handle = SyncGateway::bind(local_config(), None)
            .await
            .unwrap()
            .spawn();
        assert!(handle.base_url().starts_with("http://127.0.0.1:"));

        let stream = tokio::net::TcpStream::connect(handle.local_addr()).await;
        assert!(stream.is_ok());
        drop(stream);

        handle.shutdown().await.unwrap();
    }
}
