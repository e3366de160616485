//! Google client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

use super::authorize::AuthMode;

/// Scopes every credential must carry: read/write Calendar and Tasks.
pub const REQUIRED_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/tasks",
];

/// OAuth 2.0 client credentials registered in the Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google's client configuration JSON.
///
/// Accepts the Cloud Console download (`installed` or `web` section) and the
/// flat `{"client_id", "client_secret"}` shape.
#[derive(Debug, Deserialize)]
struct ClientConfigJson {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads credentials from a client configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read client configuration {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials from a client configuration JSON blob.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let parsed: ClientConfigJson = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse client configuration: {}", e))
        })?;

        if let Some(creds) = parsed.installed.or(parsed.web) {
            return Ok(Self::new(creds.client_id, creds.client_secret));
        }

        match (parsed.client_id, parsed.client_secret) {
            (Some(id), Some(secret)) => Ok(Self::new(id, secret)),
            _ => Err(ProviderError::configuration(
                "client configuration must contain an 'installed'/'web' section or \
                 'client_id'/'client_secret' at root level",
            )),
        }
    }

    /// Checks that the credentials look like a Google OAuth client.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Everything needed to build the Google side of the proxy.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub credentials: OAuthCredentials,

    /// Where the credential record lives.
    ///
    /// Defaults to `$XDG_DATA_HOME/calproxy/token.json`.
    pub token_path: PathBuf,

    /// How a new grant is obtained when refresh is impossible.
    pub auth_mode: AuthMode,

    /// Ports tried, in order, for the loopback redirect listener.
    pub loopback_port_range: (u16, u16),

    /// Timeout applied to every outgoing HTTP request.
    pub timeout: Duration,

    pub user_agent: String,

    /// Scopes requested and required. Defaults to [`REQUIRED_SCOPES`].
    pub scopes: Vec<String>,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            token_path: Self::default_token_path(),
            auth_mode: AuthMode::default(),
            loopback_port_range: (8080, 8090),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calproxy/{}", env!("CARGO_PKG_VERSION")),
            scopes: REQUIRED_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Default credential record location.
    pub fn default_token_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calproxy")
            .join("token.json")
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth_mode = mode;
        self
    }

    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Checks credentials and the port range.
    pub fn validate(&self) -> ProviderResult<()> {
        self.credentials
            .validate()
            .map_err(ProviderError::configuration)?;

        let (start, end) = self.loopback_port_range;
        if start == 0 || start > end {
            return Err(ProviderError::configuration(format!(
                "invalid loopback port range {}-{}",
                start, end
            )));
        }
        if self.timeout.is_zero() {
            return Err(ProviderError::configuration("timeout must be greater than zero"));
        }
        Ok(())
    }
}
