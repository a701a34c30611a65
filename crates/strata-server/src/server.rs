use strata_crypto::Wallet;
use strata_registry::{Registry, RegistryContext};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Strata registry server.
pub struct StrataServer {
    config: ServerConfig,
    state: AppState,
}

impl StrataServer {
    pub fn new(config: ServerConfig, registry: Registry) -> Self {
        Self {
            config,
            state: AppState::new(registry),
        }
    }

    /// Load the wallet named in `config` and talk to the configured gateway.
    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let path = config
            .wallet_file
            .as_deref()
            .ok_or_else(|| ServerError::Config("wallet_file is not set".into()))?;
        let wallet = Wallet::load(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        let ctx = RegistryContext::http(config.registry.clone(), wallet)?;
        Ok(Self::new(config, Registry::new(ctx)))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone(), self.config.max_body_size)
    }

    /// Serve until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            identity = %self.registry().identity(),
            application = %self.config.registry.application_name,
            "strata registry listening",
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutting down");
}
