//! CLI configuration.
//!
//! Everything lives in one `config.toml`, by default
//! `$XDG_CONFIG_HOME/calproxy/config.toml`:
//!
//! ```toml
//! debug = false
//!
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [google]
//! client_id = "env::GOOGLE_CLIENT_ID"
//! client_secret = "pass::google/calproxy"
//! token_path = "/var/lib/calproxy/token.json"
//! auth_mode = "browser"
//! loopback_port_range = [8080, 8090]
//! timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use calproxy_providers::google::{AuthMode, GoogleConfig, OAuthCredentials};
use calproxy_server::ServerConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::secret;

/// Environment variable holding a full client configuration JSON blob.
pub const CLIENT_CONFIG_ENV: &str = "GOOGLE_CLIENT_CONFIG";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug logging.
    pub debug: bool,

    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Google OAuth client and credential settings.
    pub google: GoogleSettings,
}

impl ClientConfig {
    /// Loads `path` if given, else the default file if it exists, else defaults.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    debug!(path = %path.display(), "no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific file.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| ClientError::config(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calproxy")
            .join("config.toml")
    }
}

/// `[google]` section.
///
/// `client_id`, `client_secret` and `client_config` accept secret references
/// (`pass::…`, `env::…`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    /// Whole client configuration JSON (`installed`/`web` or flat).
    pub client_config: Option<String>,

    /// Client configuration JSON file downloaded from the Cloud Console.
    pub credentials_file: Option<PathBuf>,

    /// Where the credential record is stored.
    pub token_path: Option<PathBuf>,

    pub auth_mode: Option<AuthMode>,
    pub loopback_port_range: Option<(u16, u16)>,
    pub timeout_secs: Option<u64>,
}

impl GoogleSettings {
    /// Builds the provider configuration, resolving credentials and secrets.
    pub fn to_provider_config(&self) -> ClientResult<GoogleConfig> {
        let mut config = GoogleConfig::new(self.resolve_credentials()?);

        if let Some(path) = &self.token_path {
            config = config.with_token_path(path);
        }
        if let Some(mode) = self.auth_mode {
            config = config.with_auth_mode(mode);
        }
        if let Some((start, end)) = self.loopback_port_range {
            config = config.with_loopback_port_range(start, end);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Resolves the OAuth client credentials.
    ///
    /// Sources, first match wins: `client_id` + `client_secret`,
    /// `client_config`, the `GOOGLE_CLIENT_CONFIG` environment variable,
    /// `credentials_file`.
    pub fn resolve_credentials(&self) -> ClientResult<OAuthCredentials> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => {
                return Ok(OAuthCredentials::new(
                    resolve_secret("client_id", id)?,
                    resolve_secret("client_secret", secret)?,
                ));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ClientError::config(
                    "client_id and client_secret must be set together in [google]",
                ));
            }
            (None, None) => {}
        }

        if let Some(blob) = &self.client_config {
            let json = resolve_secret("client_config", blob)?;
            return Ok(OAuthCredentials::from_json(&json)?);
        }

        if let Ok(json) = std::env::var(CLIENT_CONFIG_ENV)
            && !json.trim().is_empty()
        {
            debug!("using client configuration from {}", CLIENT_CONFIG_ENV);
            return Ok(OAuthCredentials::from_json(&json)?);
        }

        if let Some(path) = &self.credentials_file {
            return Ok(OAuthCredentials::from_file(path)?);
        }

        Err(ClientError::config(format!(
            "Google OAuth client not configured. Provide one of:\n  \
             - client_id + client_secret in the [google] section of {}\n  \
             - client_config (client JSON) or credentials_file in [google]\n  \
             - the {} environment variable\n  \
             - --client-id/--client-secret or --credentials-file on `calproxy auth google`",
            ClientConfig::default_path().display(),
            CLIENT_CONFIG_ENV
        )))
    }
}

fn resolve_secret(field: &str, value: &str) -> ClientResult<String> {
    secret::resolve(value)
        .map_err(|e| ClientError::config(format!("failed to resolve {}: {}", field, e)))
}
