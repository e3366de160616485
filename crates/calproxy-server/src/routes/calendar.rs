//! `/calendar/events` handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use calproxy_providers::{Event, EventPatch, EventQuery, NewEvent};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{MessageResponse, json_body, parse_optional_time, parse_time, query_params};
use crate::error::ApiError;
use crate::state::AppState;

/// Largest page Google accepts for `events.list`.
const MAX_RESULTS_LIMIT: u32 = 2500;

#[derive(Debug, Deserialize)]
pub(crate) struct ListEventsParams {
    max_results: Option<u32>,
    time_min: Option<String>,
    time_max: Option<String>,
}

impl ListEventsParams {
    fn into_query(self) -> Result<EventQuery, ApiError> {
        let mut query = EventQuery::new();

        if let Some(max) = self.max_results {
            if max == 0 || max > MAX_RESULTS_LIMIT {
                return Err(ApiError::validation(format!(
                    "max_results must be between 1 and {}",
                    MAX_RESULTS_LIMIT
                )));
            }
            query = query.with_max_results(max);
        }
        if let Some(time_min) = parse_optional_time("time_min", self.time_min.as_deref())? {
            query = query.with_time_min(time_min);
        }
        if let Some(time_max) = parse_optional_time("time_max", self.time_max.as_deref())? {
            query = query.with_time_max(time_max);
        }
        Ok(query)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateEventRequest {
    summary: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    description: Option<String>,
}

impl CreateEventRequest {
    fn into_new_event(self) -> Result<NewEvent, ApiError> {
        let start = parse_time("start_time", &self.start_time)?;
        let end = parse_time("end_time", &self.end_time)?;
        if end < start {
            return Err(ApiError::validation("end_time must not be before start_time"));
        }
        Ok(NewEvent {
            summary: self.summary,
            start,
            end,
            description: self.description,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UpdateEventRequest {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl UpdateEventRequest {
    fn into_patch(self) -> Result<EventPatch, ApiError> {
        let patch = EventPatch {
            start: parse_optional_time("start_time", self.start_time.as_deref())?,
            end: parse_optional_time("end_time", self.end_time.as_deref())?,
            summary: self.summary,
            description: self.description,
        };
        if let (Some(start), Some(end)) = (patch.start, patch.end)
            && end < start
        {
            return Err(ApiError::validation("end_time must not be before start_time"));
        }
        Ok(patch)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatedDetails {
    #[serde(rename = "eventId")]
    event_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateEventResponse {
    message: String,
    details: CreatedDetails,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateEventResponse {
    message: String,
    event: Event,
}

pub(crate) async fn list_events(
    State(state): State<AppState>,
    params: Result<Query<ListEventsParams>, QueryRejection>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let query = query_params(params)?.into_query()?;

    let credential = state.credential().await?;
    let events = state.calendar.list_events(&credential, query).await?;
    Ok(Json(events))
}

pub(crate) async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    let credential = state.credential().await?;
    let event = state.calendar.get_event(&credential, &event_id).await?;
    Ok(Json(event))
}

pub(crate) async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<Json<CreateEventResponse>, ApiError> {
    let event = json_body(payload)?.into_new_event()?;

    let credential = state.credential().await?;
    let created = state.calendar.insert_event(&credential, event).await?;
    info!(event_id = %created.id, "event created");

    Ok(Json(CreateEventResponse {
        message: "Event created".to_string(),
        details: CreatedDetails {
            event_id: created.id,
        },
    }))
}

pub(crate) async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    payload: Result<Json<UpdateEventRequest>, JsonRejection>,
) -> Result<Json<UpdateEventResponse>, ApiError> {
    let patch = json_body(payload)?.into_patch()?;

    let credential = state.credential().await?;
    let event = state
        .calendar
        .update_event(&credential, &event_id, patch)
        .await?;
    info!(%event_id, "event updated");

    Ok(Json(UpdateEventResponse {
        message: "Event updated".to_string(),
        event,
    }))
}

pub(crate) async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let credential = state.credential().await?;
    state.calendar.delete_event(&credential, &event_id).await?;
    info!(%event_id, "event deleted");

    Ok(MessageResponse::new("Event deleted"))
}
