//! Server error types.
//!
//! [`ServerError`] covers startup and shutdown of the listener. [`ApiError`]
//! is what request handlers return; it renders itself as a JSON body with a
//! `detail` field.

use std::io;
use std::net::SocketAddr;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use calproxy_providers::ProviderError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// IO error while serving.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// A failed API request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable credential could be acquired.
    #[error("authentication failed: {0}")]
    Auth(ProviderError),

    /// The request was malformed. Raised before any credential or provider
    /// work happens.
    #[error("{0}")]
    Validation(String),

    /// The remote API call failed.
    #[error("{0}")]
    Provider(#[from] ProviderError),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Auth(e) => {
                warn!(error = %e, "credential unavailable");
                json!({
                    "detail": format!("authentication failed: {}", e.message()),
                    "code": e.code().as_str(),
                })
            }
            ApiError::Validation(message) => json!({ "detail": message }),
            ApiError::Provider(e) => {
                error!(error = %e, "provider call failed");
                json!({
                    "detail": e.message(),
                    "code": e.code().as_str(),
                    "provider_status": e.status(),
                })
            }
        };

        (status, Json(body)).into_response()
    }
}
