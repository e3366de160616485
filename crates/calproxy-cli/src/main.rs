//! calproxy CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use calproxy_cli::cli::{AuthAction, Cli, Command, ConfigAction};
use calproxy_cli::commands::{self, auth::GoogleOverrides};
use calproxy_cli::config::ClientConfig;
use calproxy_cli::error::ClientResult;
use calproxy_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = ClientConfig::load(cli.config.as_deref())?;
    let debug = cli.debug || config.debug;

    let log_config = match &cli.command {
        Command::Serve { json_logs, .. } => {
            let server = TracingConfig::server().with_json(*json_logs);
            if debug {
                server.with_level(tracing::Level::DEBUG)
            } else {
                server
            }
        }
        _ => TracingConfig::cli(debug),
    };
    init_tracing(log_config)?;

    match cli.command {
        Command::Serve { bind, .. } => commands::serve::run(&config, bind).await,
        Command::Auth { action } => match action {
            AuthAction::Google {
                client_id,
                client_secret,
                credentials_file,
                console,
                force,
            } => {
                let overrides = GoogleOverrides {
                    client_id,
                    client_secret,
                    credentials_file,
                    console,
                };
                commands::auth::google(&config, overrides, force).await
            }
            AuthAction::Status => commands::auth::status(&config),
            AuthAction::Logout => commands::auth::logout(&config).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
