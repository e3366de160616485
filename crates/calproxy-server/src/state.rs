//! Shared request state.

use std::sync::Arc;

use calproxy_providers::google::{Credential, CredentialManager, GoogleServices};
use calproxy_providers::{CalendarProvider, TaskProvider};

use crate::error::ApiError;

/// Everything a handler needs, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialManager>,
    pub calendar: Arc<dyn CalendarProvider>,
    pub tasks: Arc<dyn TaskProvider>,
}

impl AppState {
    pub fn new(
        credentials: Arc<CredentialManager>,
        calendar: Arc<dyn CalendarProvider>,
        tasks: Arc<dyn TaskProvider>,
    ) -> Self {
        Self {
            credentials,
            calendar,
            tasks,
        }
    }

    /// Acquires a usable credential, mapping failure to a 401.
    pub async fn credential(&self) -> Result<Credential, ApiError> {
        self.credentials.acquire().await.map_err(ApiError::Auth)
    }
}

impl From<GoogleServices> for AppState {
    fn from(services: GoogleServices) -> Self {
        Self::new(services.credentials, services.calendar, services.tasks)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("credentials", &self.credentials)
            .field("calendar", &self.calendar.name())
            .field("tasks", &self.tasks.name())
            .finish()
    }
}
