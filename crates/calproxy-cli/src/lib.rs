//! The `calproxy` command-line interface: configuration, secret references
//! and the `serve` / `auth` / `config` commands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
