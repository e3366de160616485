//! Credential lifecycle and Google Calendar/Tasks clients for calproxy.
//!
//! - [`google::CredentialManager`] - Decides per request whether the stored
//!   credential can be used, refreshed, or must be re-authorized
//! - [`CalendarProvider`] / [`TaskProvider`] - The operations the HTTP layer
//!   proxies
//! - [`ProviderError`] - Error type shared by every component
//!
//! # Architecture
//!
//! ```text
//!                 ┌────────────────────┐
//!   request ────▶ │ CredentialManager  │ ──▶ CredentialStore (token.json)
//!                 └─────────┬──────────┘
//!                           │ refresh / authorize
//!                           ▼
//!                 ┌────────────────────┐
//!                 │    OAuthClient     │ ──▶ oauth2.googleapis.com
//!                 └────────────────────┘
//!
//!   Credential ──▶ GoogleCalendarClient / GoogleTasksClient ──▶ googleapis.com
//! ```

pub mod error;
pub mod google;
pub mod provider;
pub mod resource;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{BoxFuture, CalendarProvider, TaskProvider};
pub use resource::{
    Event, EventPatch, EventQuery, NewEvent, NewTask, Task, TaskList, TaskPatch, TaskStatus,
};
