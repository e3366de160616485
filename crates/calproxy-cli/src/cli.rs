//! Command-line interface definition.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// calproxy - HTTP API for Google Calendar and Google Tasks
#[derive(Debug, Parser)]
#[command(name = "calproxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALPROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API server in the foreground
    Serve {
        /// Address to listen on (overrides `[server] bind`)
        #[arg(long, env = "CALPROXY_BIND")]
        bind: Option<SocketAddr>,

        /// Emit logs as JSON lines
        #[arg(long)]
        json_logs: bool,
    },

    /// Credential commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Credential actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Authorize access to Google Calendar and Tasks and store the credential
    Google {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Path to the Google Cloud Console client JSON file
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,

        /// Paste the authorization code instead of using a browser redirect
        #[arg(long)]
        console: bool,

        /// Re-authorize even if a usable credential is stored
        #[arg(long, short)]
        force: bool,
    },

    /// Show the stored credential's state
    Status,

    /// Remove the stored credential
    Logout,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
