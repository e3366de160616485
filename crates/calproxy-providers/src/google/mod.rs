//! Google Calendar and Google Tasks support.
//!
//! # Credential lifecycle
//!
//! 1. The credential is loaded from the [`FileCredentialStore`]
//! 2. If it is valid and carries the required scopes it is used as is
//! 3. An expired credential with a refresh token is refreshed silently
//! 4. Otherwise the configured [`Authorizer`] obtains a new grant
//! 5. Renewed credentials are persisted for later requests and restarts
//!
//! # Example
//!
//! ```ignore
//! use calproxy_providers::google::{GoogleConfig, GoogleServices, OAuthCredentials};
//!
//! let config = GoogleConfig::new(OAuthCredentials::new(
//!     "your-client-id.apps.googleusercontent.com",
//!     "your-client-secret",
//! ));
//! let services = GoogleServices::from_config(&config)?;
//!
//! let credential = services.credentials.acquire().await?;
//! let events = services.calendar.list_events(&credential, &EventQuery::new()).await?;
//! ```

mod authorize;
mod calendar;
mod config;
mod http;
mod lifecycle;
mod oauth;
mod services;
mod tasks;
mod tokens;

pub use authorize::{
    AuthMode, Authorizer, CALLBACK_TIMEOUT, ConsoleAuthorizer, DisabledAuthorizer,
    LoopbackAuthorizer, authorizer_for,
};
pub use calendar::{CALENDAR_API_BASE, GoogleCalendarClient};
pub use config::{GoogleConfig, OAuthCredentials, REQUIRED_SCOPES};
pub use lifecycle::{CredentialManager, CredentialStatus};
pub use oauth::{GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, OAuthClient, PkceFlow, RefreshedToken, TokenRefresher};
pub use services::GoogleServices;
pub use tasks::{GoogleTasksClient, TASKS_API_BASE};
pub use tokens::{
    Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError,
    StoreResult,
};
