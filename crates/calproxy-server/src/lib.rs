//! HTTP API in front of Google Calendar and Google Tasks.
//!
//! ```ignore
//! use calproxy_server::{AppState, Server, ServerConfig, ShutdownSignal};
//!
//! let state = AppState::from(GoogleServices::from_config(&google)?);
//! let shutdown = ShutdownSignal::new();
//! shutdown.spawn_listener();
//!
//! Server::bind(&ServerConfig::default(), state).await?.run(shutdown).await?;
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod signals;
pub mod state;

pub use config::{DEFAULT_BIND, ServerConfig};
pub use error::{ApiError, ServerError, ServerResult};
pub use routes::router;
pub use server::Server;
pub use signals::ShutdownSignal;
pub use state::AppState;
