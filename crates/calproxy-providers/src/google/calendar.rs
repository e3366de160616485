//! Google Calendar API v3 client for the primary calendar.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarProvider};
use crate::resource::{Event, EventPatch, EventQuery, NewEvent, to_rfc3339};

use super::config::GoogleConfig;
use super::http::ApiClient;
use super::tokens::Credential;

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const EVENTS_PATH: &str = "/calendars/primary/events";

/// Timezone attached to events this client writes.
const EVENT_TIMEZONE: &str = "UTC";

/// Google Calendar client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    api: ApiClient,
}

impl GoogleCalendarClient {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self {
            api: ApiClient::new("calendar", CALENDAR_API_BASE, config.timeout, &config.user_agent)?,
        })
    }

    /// Points the client at another API root (used against mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api = self.api.with_base_url(base_url);
        self
    }

    fn event_path(event_id: &str) -> String {
        format!("{}/{}", EVENTS_PATH, urlencoding::encode(event_id))
    }

    pub async fn list_events(
        &self,
        credential: &Credential,
        query: &EventQuery,
    ) -> ProviderResult<Vec<Event>> {
        let time_min = query.time_min.unwrap_or_else(Utc::now);
        let mut params = vec![
            ("timeMin", to_rfc3339(&time_min)),
            ("maxResults", query.max_results.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(time_max) = query.time_max {
            params.push(("timeMax", to_rfc3339(&time_max)));
        }

        let list: EventListResponse = self.api.get(credential, EVENTS_PATH, &params).await?;
        let events: Vec<Event> = list
            .items
            .into_iter()
            .filter(|e| e.status.as_deref() != Some("cancelled"))
            .map(Event::from)
            .collect();

        debug!("fetched {} events from primary calendar", events.len());
        Ok(events)
    }

    pub async fn get_event(&self, credential: &Credential, event_id: &str) -> ProviderResult<Event> {
        let event: ApiEvent = self
            .api
            .get(credential, &Self::event_path(event_id), &[])
            .await?;
        Ok(event.into())
    }

    pub async fn insert_event(&self, credential: &Credential, event: &NewEvent) -> ProviderResult<Event> {
        let mut body = json!({
            "summary": event.summary,
            "start": event_time(&event.start),
            "end": event_time(&event.end),
        });
        if let Some(description) = &event.description {
            body["description"] = json!(description);
        }

        let created: ApiEvent = self
            .api
            .send_json(Method::POST, credential, EVENTS_PATH, &body)
            .await?;
        debug!(event_id = %created.id, "created event");
        Ok(created.into())
    }

    /// Fetches the raw event, overlays the patch and writes it back whole so
    /// fields this API does not model survive the update.
    pub async fn update_event(
        &self,
        credential: &Credential,
        event_id: &str,
        patch: &EventPatch,
    ) -> ProviderResult<Event> {
        let path = Self::event_path(event_id);
        if patch.is_empty() {
            debug!(event_id, "empty patch, returning current event");
            let current: ApiEvent = self.api.get(credential, &path, &[]).await?;
            return Ok(current.into());
        }

        let mut current: Value = self.api.get(credential, &path, &[]).await?;

        let object = current.as_object_mut().ok_or_else(|| {
            ProviderError::invalid_response("event resource is not a JSON object")
                .with_provider(self.api.provider())
        })?;
        merge_event(object, patch);

        let updated: ApiEvent = self
            .api
            .send_json(Method::PUT, credential, &path, &current)
            .await?;
        debug!(event_id = %updated.id, "updated event");
        Ok(updated.into())
    }

    pub async fn delete_event(&self, credential: &Credential, event_id: &str) -> ProviderResult<()> {
        self.api.delete(credential, &Self::event_path(event_id)).await?;
        debug!(event_id, "deleted event");
        Ok(())
    }
}

fn event_time(dt: &DateTime<Utc>) -> Value {
    json!({ "dateTime": to_rfc3339(dt), "timeZone": EVENT_TIMEZONE })
}

fn merge_event(object: &mut Map<String, Value>, patch: &EventPatch) {
    if let Some(summary) = &patch.summary {
        object.insert("summary".into(), json!(summary));
    }
    if let Some(description) = &patch.description {
        object.insert("description".into(), json!(description));
    }
    if let Some(start) = &patch.start {
        set_event_time(object, "start", start);
    }
    if let Some(end) = &patch.end {
        set_event_time(object, "end", end);
    }
}

/// Sets `dateTime` on a start/end object, turning an all-day value into a
/// timed one.
fn set_event_time(object: &mut Map<String, Value>, key: &str, dt: &DateTime<Utc>) {
    let entry = object.entry(key).or_insert_with(|| json!({}));
    match entry.as_object_mut() {
        Some(time) => {
            time.remove("date");
            time.insert("dateTime".into(), json!(to_rfc3339(dt)));
            time.entry("timeZone").or_insert_with(|| json!(EVENT_TIMEZONE));
        }
        None => *entry = event_time(dt),
    }
}

impl CalendarProvider for GoogleCalendarClient {
    fn name(&self) -> &str {
        self.api.provider()
    }

    fn list_events<'a>(
        &'a self,
        credential: &'a Credential,
        query: EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<Event>>> {
        Box::pin(async move { GoogleCalendarClient::list_events(self, credential, &query).await })
    }

    fn get_event<'a>(
        &'a self,
        credential: &'a Credential,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Event>> {
        Box::pin(GoogleCalendarClient::get_event(self, credential, event_id))
    }

    fn insert_event<'a>(
        &'a self,
        credential: &'a Credential,
        event: NewEvent,
    ) -> BoxFuture<'a, ProviderResult<Event>> {
        Box::pin(async move { GoogleCalendarClient::insert_event(self, credential, &event).await })
    }

    fn update_event<'a>(
        &'a self,
        credential: &'a Credential,
        event_id: &'a str,
        patch: EventPatch,
    ) -> BoxFuture<'a, ProviderResult<Event>> {
        Box::pin(async move {
            GoogleCalendarClient::update_event(self, credential, event_id, &patch).await
        })
    }

    fn delete_event<'a>(
        &'a self,
        credential: &'a Credential,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(GoogleCalendarClient::delete_event(self, credential, event_id))
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

#[derive(Debug, Deserialize)]
struct ApiEvent {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    #[serde(default)]
    end: ApiEventTime,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl ApiEventTime {
    fn into_string(self) -> String {
        self.date_time.or(self.date).unwrap_or_default()
    }
}

impl From<ApiEvent> for Event {
    fn from(event: ApiEvent) -> Self {
        Self {
            id: event.id,
            start: event.start.into_string(),
            end: event.end.into_string(),
            summary: event.summary.unwrap_or_default(),
            description: event.description,
        }
    }
}
