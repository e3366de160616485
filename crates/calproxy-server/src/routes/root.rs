use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use calproxy_providers::EventQuery;
use calproxy_providers::google::CredentialStatus;
use serde::Serialize;
use tracing::info;

use super::MessageResponse;
use crate::error::ApiError;
use crate::state::AppState;

pub(crate) async fn welcome() -> Json<MessageResponse> {
    MessageResponse::new("Welcome to the calproxy Google Calendar API")
}

#[derive(Debug, Serialize)]
pub(crate) struct NextEvent {
    start: String,
    summary: String,
}

/// Makes sure a credential exists (running the interactive flow if needed)
/// and shows the next upcoming event as a smoke test.
pub(crate) async fn login(State(state): State<AppState>) -> Result<Response, ApiError> {
    let credential = state.credential().await?;
    info!("login check passed");

    let events = state
        .calendar
        .list_events(&credential, EventQuery::new().with_max_results(1))
        .await?;

    Ok(match events.into_iter().next() {
        Some(event) => Json(NextEvent {
            start: event.start,
            summary: event.summary,
        })
        .into_response(),
        None => MessageResponse::new("No upcoming events found.").into_response(),
    })
}

pub(crate) async fn auth_status(State(state): State<AppState>) -> Json<CredentialStatus> {
    Json(state.credentials.status())
}
