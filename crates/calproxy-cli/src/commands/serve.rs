//! `calproxy serve`: runs the HTTP API in the foreground until SIGINT/SIGTERM.

use std::net::SocketAddr;

use calproxy_providers::google::GoogleServices;
use calproxy_server::{AppState, Server, ShutdownSignal};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::ClientResult;

pub async fn run(config: &ClientConfig, bind: Option<SocketAddr>) -> ClientResult<()> {
    let google = config.google.to_provider_config()?;
    let services = GoogleServices::from_config(&google)?;

    let status = services.credentials.status();
    if !status.is_usable() {
        warn!(
            present = status.present,
            auth_mode = %google.auth_mode,
            "no usable credential stored, the first request will renew it"
        );
    }

    let mut server_config = config.server.clone();
    if let Some(bind) = bind {
        server_config = server_config.with_bind(bind);
    }

    let shutdown = ShutdownSignal::new();
    shutdown.spawn_listener();

    let server = Server::bind(&server_config, AppState::from(services)).await?;
    info!(
        token_path = %google.token_path.display(),
        "serving Google Calendar and Tasks"
    );
    server.run(shutdown).await?;
    Ok(())
}
