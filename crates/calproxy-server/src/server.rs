//! Listener lifecycle.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::routes::router;
use crate::signals::ShutdownSignal;
use crate::state::AppState;

/// The HTTP API server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    state: AppState,
}

impl Server {
    /// Binds the configured address.
    pub async fn bind(config: &ServerConfig, state: AppState) -> ServerResult<Self> {
        let listener = TcpListener::bind(config.bind)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind,
                source,
            })?;
        Ok(Self { listener, state })
    }

    /// The address actually bound (differs from the configured one for port 0).
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until `shutdown` fires, then drains in-flight requests.
    pub async fn run(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let addr = self.local_addr()?;
        info!(%addr, "calproxy listening");

        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        info!("server stopped");
        Ok(())
    }
}
