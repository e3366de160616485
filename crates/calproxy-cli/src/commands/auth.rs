//! `calproxy auth`: provisions, inspects and removes the stored credential.

use std::path::PathBuf;

use calproxy_providers::google::{AuthMode, GoogleServices, OAuthCredentials};
use tracing::info;

use crate::config::{ClientConfig, GoogleSettings};
use crate::error::{ClientError, ClientResult};

/// Command-line overrides for the OAuth client.
#[derive(Debug, Default)]
pub struct GoogleOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub console: bool,
}

/// Runs the interactive flow and stores the resulting credential.
pub async fn google(config: &ClientConfig, overrides: GoogleOverrides, force: bool) -> ClientResult<()> {
    let settings = apply_overrides(&config.google, &overrides)?;
    let mut google = settings.to_provider_config()?;

    // A disabled mode only applies to the server; this command exists to prompt.
    google.auth_mode = match (overrides.console, google.auth_mode) {
        (true, _) => AuthMode::Console,
        (false, AuthMode::Disabled) => AuthMode::Browser,
        (false, mode) => mode,
    };

    let services = GoogleServices::from_config(&google)?;
    let manager = &services.credentials;

    if !force && manager.status().is_usable() {
        println!("Already authorized for Google Calendar and Tasks.");
        println!("Use --force to authorize again.");
        return Ok(());
    }

    println!("Starting Google authorization for:");
    for scope in manager.scopes() {
        println!("  {}", scope);
    }
    if google.auth_mode == AuthMode::Browser {
        println!("A browser window will open. If it does not, open the URL printed below.");
    }
    println!();

    let credential = manager.authorize_now().await?;
    info!(expires_at = ?credential.expires_at, "authorization complete");

    println!();
    println!("Authorization successful.");
    println!("Credential stored at {}", google.token_path.display());
    Ok(())
}

/// Prints the stored credential's state as JSON.
pub fn status(config: &ClientConfig) -> ClientResult<()> {
    let services = services(config)?;
    let status = services.credentials.status();
    let json = serde_json::to_string_pretty(&status)
        .map_err(|e| ClientError::config(format!("failed to render status: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Deletes the stored credential.
pub async fn logout(config: &ClientConfig) -> ClientResult<()> {
    let services = services(config)?;
    services.credentials.logout().await?;
    println!("Stored credential removed.");
    Ok(())
}

fn services(config: &ClientConfig) -> ClientResult<GoogleServices> {
    let google = config.google.to_provider_config()?;
    Ok(GoogleServices::from_config(&google)?)
}

/// Command-line credentials replace whatever the file configured.
fn apply_overrides(settings: &GoogleSettings, overrides: &GoogleOverrides) -> ClientResult<GoogleSettings> {
    let mut settings = settings.clone();

    match (&overrides.client_id, &overrides.client_secret) {
        (Some(id), Some(secret)) => {
            settings.client_id = Some(id.clone());
            settings.client_secret = Some(secret.clone());
            settings.client_config = None;
            settings.credentials_file = None;
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(ClientError::config(
                "both --client-id and --client-secret are required when providing credentials directly",
            ));
        }
        (None, None) => {
            if let Some(path) = &overrides.credentials_file {
                let creds = OAuthCredentials::from_file(path)?;
                settings.client_id = Some(creds.client_id);
                settings.client_secret = Some(creds.client_secret);
                settings.client_config = None;
            }
        }
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_ID: &str = "cli.apps.googleusercontent.com";

    fn file_settings() -> GoogleSettings {
        GoogleSettings {
            client_id: Some("file.apps.googleusercontent.com".to_string()),
            client_secret: Some("file-secret".to_string()),
            ..GoogleSettings::default()
        }
    }

    #[test]
    fn flags_override_file_credentials() {
        let overrides = GoogleOverrides {
            client_id: Some(CLIENT_ID.to_string()),
            client_secret: Some("cli-secret".to_string()),
            ..GoogleOverrides::default()
        };
        let settings = apply_overrides(&file_settings(), &overrides).unwrap();
        let creds = settings.resolve_credentials().unwrap();
        assert_eq!(creds.client_id, CLIENT_ID);
        assert_eq!(creds.client_secret, "cli-secret");
    }

    #[test]
    fn no_flags_keep_file_credentials() {
        let settings = apply_overrides(&file_settings(), &GoogleOverrides::default()).unwrap();
        assert_eq!(settings, file_settings());
    }

    #[test]
    fn partial_flags_error() {
        let overrides = GoogleOverrides {
            client_id: Some(CLIENT_ID.to_string()),
            ..GoogleOverrides::default()
        };
        assert!(apply_overrides(&file_settings(), &overrides).is_err());
    }

    #[test]
    fn credentials_file_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            format!(r#"{{"installed": {{"client_id": "{}", "client_secret": "json"}}}}"#, CLIENT_ID),
        )
        .unwrap();

        let overrides = GoogleOverrides {
            credentials_file: Some(path),
            ..GoogleOverrides::default()
        };
        let settings = apply_overrides(&GoogleSettings::default(), &overrides).unwrap();
        assert_eq!(settings.client_id.as_deref(), Some(CLIENT_ID));
        assert_eq!(settings.client_secret.as_deref(), Some("json"));
    }

    #[tokio::test]
    async fn status_and_logout_use_the_configured_token_path() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        std::fs::write(&token_path, r#"{"access_token": "a", "refresh_token": "r"}"#).unwrap();

        let mut config = ClientConfig::default();
        config.google = GoogleSettings {
            token_path: Some(token_path.clone()),
            ..file_settings()
        };

        status(&config).unwrap();
        logout(&config).await.unwrap();
        assert!(!token_path.exists());
    }
}
