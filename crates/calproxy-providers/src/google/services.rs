//! Wiring of the Google side from a [`GoogleConfig`].

use std::sync::Arc;

use tracing::debug;

use crate::error::ProviderResult;

use super::authorize::authorizer_for;
use super::calendar::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::lifecycle::CredentialManager;
use super::oauth::OAuthClient;
use super::tasks::GoogleTasksClient;
use super::tokens::FileCredentialStore;

/// The credential manager and API clients for one Google account.
#[derive(Debug, Clone)]
pub struct GoogleServices {
    pub credentials: Arc<CredentialManager>,
    pub calendar: Arc<GoogleCalendarClient>,
    pub tasks: Arc<GoogleTasksClient>,
}

impl GoogleServices {
    /// Builds every component from `config`. No network traffic happens here.
    pub fn from_config(config: &GoogleConfig) -> ProviderResult<Self> {
        config.validate()?;

        let oauth = Arc::new(OAuthClient::new(config.credentials.clone(), config.timeout)?);
        let store = Arc::new(FileCredentialStore::new(&config.token_path));
        let authorizer = authorizer_for(config.auth_mode, oauth.clone(), config.loopback_port_range);

        let manager = CredentialManager::new(store, oauth, authorizer).with_scopes(config.scopes.clone());

        debug!(
            token_path = %config.token_path.display(),
            auth_mode = %config.auth_mode,
            "configured Google services"
        );

        Ok(Self {
            credentials: Arc::new(manager),
            calendar: Arc::new(GoogleCalendarClient::new(config)?),
            tasks: Arc::new(GoogleTasksClient::new(config)?),
        })
    }
}
