//! Calendar and task resources exchanged with providers.
//!
//! These are the shapes the HTTP API speaks. Provider clients translate them
//! to and from the Google wire formats.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Formats an instant the way Google APIs expect it.
pub fn to_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A calendar event.
///
/// `start`/`end` are the provider's `dateTime`, or `date` for all-day events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub start: String,
    pub end: String,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Filter for listing events from the primary calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub max_results: u32,
    /// Lower bound on event end time. `None` means "now".
    pub time_min: Option<DateTime<Utc>>,
    /// Upper bound on event start time.
    pub time_max: Option<DateTime<Utc>>,
}

impl EventQuery {
    pub const DEFAULT_MAX_RESULTS: u32 = 10;

    pub fn new() -> Self {
        Self {
            max_results: Self::DEFAULT_MAX_RESULTS,
            time_min: None,
            time_max: None,
        }
    }

    pub fn with_max_results(mut self, max: u32) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_time_min(mut self, time_min: DateTime<Utc>) -> Self {
        self.time_min = Some(time_min);
        self
    }

    pub fn with_time_max(mut self, time_max: DateTime<Utc>) -> Self {
        self.time_max = Some(time_max);
        self
    }
}

impl Default for EventQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// A validated event to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: Option<String>,
}

/// Fields to change on an existing event. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub summary: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.description.is_none()
    }
}

/// A named container of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: String,
    pub title: String,
}

/// Completion state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "needsAction")]
    NeedsAction,
    #[serde(rename = "completed")]
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsAction => "needsAction",
            Self::Completed => "completed",
        }
    }
}

/// A task inside a task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
}

/// A validated task to create. New tasks always start as `needsAction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub notes: Option<String>,
    pub due: Option<DateTime<Utc>>,
}

/// Fields to change on an existing task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due: Option<DateTime<Utc>>,
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.notes.is_none() && self.due.is_none() && self.status.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn task_status_wire_names() {
        assert_eq!(serde_json::to_string(&TaskStatus::NeedsAction).unwrap(), "\"needsAction\"");
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"completed\"").unwrap(),
            TaskStatus::Completed
        );
        assert!(serde_json::from_str::<TaskStatus>("\"done\"").is_err());
        assert_eq!(TaskStatus::default().as_str(), "needsAction");
    }

    #[test]
    fn task_tolerates_missing_optional_fields() {
        let task: Task = serde_json::from_str(r#"{"id": "t1", "title": "Buy milk", "status": "needsAction"}"#).unwrap();
        assert_eq!(task.id, "t1");
        assert!(task.notes.is_none());
        assert!(task.parent.is_none());
    }

    #[test]
    fn event_query_defaults() {
        let query = EventQuery::default();
        assert_eq!(query.max_results, 10);
        assert!(query.time_min.is_none());

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let query = EventQuery::new().with_max_results(5).with_time_min(start);
        assert_eq!(query.max_results, 5);
        assert_eq!(query.time_min, Some(start));
    }

    #[test]
    fn patches_report_emptiness() {
        assert!(EventPatch::default().is_empty());
        assert!(TaskPatch::default().is_empty());
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..TaskPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn rfc3339_formatting() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(to_rfc3339(&dt), "2024-01-01T10:00:00Z");
    }
}
