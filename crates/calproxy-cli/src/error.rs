//! CLI error types.

use calproxy_core::TracingError;
use calproxy_providers::ProviderError;
use calproxy_server::ServerError;
use thiserror::Error;

/// Result type for CLI operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider or credential error.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// The HTTP server failed to start or stopped with an error.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// Logging could not be initialized.
    #[error("tracing error: {0}")]
    Tracing(#[from] TracingError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
