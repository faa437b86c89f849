//! HTTP server startup and shutdown

use tokio::net::TcpListener;
use tracing::info;

use crate::api;
use crate::core::{Config, ServerState};
use crate::utils::{AppError, AppResult};

pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Reuse an existing state instead of opening the database again
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    /// Bind and serve until ctrl-c
    pub async fn run(self) -> AppResult<()> {
        let state = match self.state {
            Some(s) => s,
            None => ServerState::initialize(&self.config).await?,
        };

        let app = api::build_app().with_state(state);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
        info!("Rollbook server listening on {addr}");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutting down");
}
