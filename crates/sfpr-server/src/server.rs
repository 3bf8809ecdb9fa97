use std::sync::Arc;

use sfpr_registry::{Registry, ServerConfig};
use tokio::net::TcpListener;

use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// The registry HTTP server.
pub struct RegistryServer {
    registry: Arc<Registry>,
}

impl RegistryServer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.registry.config().server
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(self.registry.clone()))
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let addr = self.config().bind_addr;
        let app = self.router();
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "registry server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
