//! End-to-end tests of the HTTP API against in-memory providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use calproxy_providers::google::{
    Authorizer, Credential, CredentialManager, DisabledAuthorizer, MemoryCredentialStore,
    REQUIRED_SCOPES, RefreshedToken, TokenRefresher,
};
use calproxy_providers::{
    BoxFuture, CalendarProvider, Event, EventPatch, EventQuery, NewEvent, NewTask, ProviderError,
    ProviderResult, Task, TaskList, TaskPatch, TaskProvider, TaskStatus, resource::to_rfc3339,
};
use calproxy_server::{AppState, router};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

#[derive(Default)]
struct FakeCalendar {
    events: Mutex<Vec<Event>>,
    calls: AtomicUsize,
    last_query: Mutex<Option<EventQuery>>,
}

impl FakeCalendar {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn not_found(event_id: &str) -> ProviderError {
        ProviderError::from_status(404, format!("API error (404): event {} not found", event_id))
            .with_provider("calendar")
    }
}

impl CalendarProvider for FakeCalendar {
    fn name(&self) -> &str {
        "calendar"
    }

    fn list_events<'a>(
        &'a self,
        _credential: &'a Credential,
        query: EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<Event>>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let events = self.events.lock().unwrap();
            let listed = events
                .iter()
                .take(query.max_results as usize)
                .cloned()
                .collect();
            *self.last_query.lock().unwrap() = Some(query);
            Ok(listed)
        })
    }

    fn get_event<'a>(
        &'a self,
        _credential: &'a Credential,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Event>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.events
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.id == event_id)
                .cloned()
                .ok_or_else(|| Self::not_found(event_id))
        })
    }

    fn insert_event<'a>(
        &'a self,
        _credential: &'a Credential,
        event: NewEvent,
    ) -> BoxFuture<'a, ProviderResult<Event>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut events = self.events.lock().unwrap();
            let created = Event {
                id: format!("evt{}", events.len() + 1),
                start: to_rfc3339(&event.start),
                end: to_rfc3339(&event.end),
                summary: event.summary,
                description: event.description,
            };
            events.push(created.clone());
            Ok(created)
        })
    }

    fn update_event<'a>(
        &'a self,
        _credential: &'a Credential,
        event_id: &'a str,
        patch: EventPatch,
    ) -> BoxFuture<'a, ProviderResult<Event>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut events = self.events.lock().unwrap();
            let event = events
                .iter_mut()
                .find(|e| e.id == event_id)
                .ok_or_else(|| Self::not_found(event_id))?;
            if let Some(summary) = patch.summary {
                event.summary = summary;
            }
            if let Some(start) = patch.start {
                event.start = to_rfc3339(&start);
            }
            if let Some(end) = patch.end {
                event.end = to_rfc3339(&end);
            }
            if let Some(description) = patch.description {
                event.description = Some(description);
            }
            Ok(event.clone())
        })
    }

    fn delete_event<'a>(
        &'a self,
        _credential: &'a Credential,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut events = self.events.lock().unwrap();
            let before = events.len();
            events.retain(|e| e.id != event_id);
            if events.len() == before {
                return Err(Self::not_found(event_id));
            }
            Ok(())
        })
    }
}

#[derive(Default)]
struct FakeTasks {
    lists: Mutex<Vec<TaskList>>,
    tasks: Mutex<Vec<(String, Task)>>,
    calls: AtomicUsize,
}

impl FakeTasks {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn not_found(task_id: &str) -> ProviderError {
        ProviderError::from_status(404, format!("API error (404): task {} not found", task_id))
            .with_provider("tasks")
    }
}

impl TaskProvider for FakeTasks {
    fn name(&self) -> &str {
        "tasks"
    }

    fn list_task_lists<'a>(
        &'a self,
        _credential: &'a Credential,
    ) -> BoxFuture<'a, ProviderResult<Vec<TaskList>>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.lists.lock().unwrap().clone())
        })
    }

    fn insert_task_list<'a>(
        &'a self,
        _credential: &'a Credential,
        title: &'a str,
    ) -> BoxFuture<'a, ProviderResult<TaskList>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut lists = self.lists.lock().unwrap();
            let list = TaskList {
                id: format!("list{}", lists.len() + 1),
                title: title.to_string(),
            };
            lists.push(list.clone());
            Ok(list)
        })
    }

    fn list_tasks<'a>(
        &'a self,
        _credential: &'a Credential,
        list_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<Task>>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .tasks
                .lock()
                .unwrap()
                .iter()
                .filter(|(list, _)| list == list_id)
                .map(|(_, task)| task.clone())
                .collect())
        })
    }

    fn get_task<'a>(
        &'a self,
        _credential: &'a Credential,
        list_id: &'a str,
        task_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Task>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tasks
                .lock()
                .unwrap()
                .iter()
                .find(|(list, task)| list == list_id && task.id == task_id)
                .map(|(_, task)| task.clone())
                .ok_or_else(|| Self::not_found(task_id))
        })
    }

    fn insert_task<'a>(
        &'a self,
        _credential: &'a Credential,
        list_id: &'a str,
        task: NewTask,
    ) -> BoxFuture<'a, ProviderResult<Task>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut tasks = self.tasks.lock().unwrap();
            let created = Task {
                id: format!("task{}", tasks.len() + 1),
                title: task.title,
                notes: task.notes,
                due: task.due.as_ref().map(to_rfc3339),
                status: TaskStatus::NeedsAction,
                position: None,
                parent: None,
            };
            tasks.push((list_id.to_string(), created.clone()));
            Ok(created)
        })
    }

    fn update_task<'a>(
        &'a self,
        _credential: &'a Credential,
        list_id: &'a str,
        task_id: &'a str,
        patch: TaskPatch,
    ) -> BoxFuture<'a, ProviderResult<Task>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut tasks = self.tasks.lock().unwrap();
            let (_, task) = tasks
                .iter_mut()
                .find(|(list, task)| list == list_id && task.id == task_id)
                .ok_or_else(|| Self::not_found(task_id))?;
            if let Some(title) = patch.title {
                task.title = title;
            }
            if let Some(notes) = patch.notes {
                task.notes = Some(notes);
            }
            if let Some(due) = patch.due {
                task.due = Some(to_rfc3339(&due));
            }
            if let Some(status) = patch.status {
                task.status = status;
            }
            Ok(task.clone())
        })
    }

    fn delete_task<'a>(
        &'a self,
        _credential: &'a Credential,
        list_id: &'a str,
        task_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut tasks = self.tasks.lock().unwrap();
            let before = tasks.len();
            tasks.retain(|(list, task)| !(list == list_id && task.id == task_id));
            if tasks.len() == before {
                return Err(Self::not_found(task_id));
            }
            Ok(())
        })
    }
}

#[derive(Default)]
struct CountingRefresher {
    calls: AtomicUsize,
}

impl TokenRefresher for CountingRefresher {
    fn refresh<'a>(&'a self, _refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<RefreshedToken>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RefreshedToken {
                access_token: "refreshed".to_string(),
                expires_in: Some(3600),
                refresh_token: None,
                scopes: None,
                token_type: None,
            })
        })
    }
}

#[derive(Default)]
struct CountingAuthorizer {
    calls: AtomicUsize,
}

impl Authorizer for CountingAuthorizer {
    fn authorize<'a>(&'a self, scopes: &'a [String]) -> BoxFuture<'a, ProviderResult<Credential>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Credential::new(
                "authorized",
                Some("refresh".to_string()),
                Some(3600),
                scopes.iter().cloned(),
            ))
        })
    }
}

fn valid_credential() -> Credential {
    Credential::new(
        "access",
        Some("refresh".to_string()),
        Some(3600),
        REQUIRED_SCOPES,
    )
}

struct Harness {
    state: AppState,
    store: Arc<MemoryCredentialStore>,
    calendar: Arc<FakeCalendar>,
    tasks: Arc<FakeTasks>,
    refresher: Arc<CountingRefresher>,
}

impl Harness {
    fn new(store: MemoryCredentialStore, authorizer: Arc<dyn Authorizer>) -> Self {
        let store = Arc::new(store);
        let refresher = Arc::new(CountingRefresher::default());
        let calendar = Arc::new(FakeCalendar::default());
        let tasks = Arc::new(FakeTasks::default());
        let manager = CredentialManager::new(store.clone(), refresher.clone(), authorizer);
        let state = AppState::new(Arc::new(manager), calendar.clone(), tasks.clone());
        Self {
            state,
            store,
            calendar,
            tasks,
            refresher,
        }
    }

    fn authorized() -> Self {
        Self::new(
            MemoryCredentialStore::with_credential(valid_credential()),
            Arc::new(DisabledAuthorizer),
        )
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = router(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }
}

#[tokio::test]
async fn welcome_and_health() {
    let harness = Harness::authorized();

    let (status, body) = harness.send(Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().starts_with("Welcome"));

    let (status, body) = harness.send(Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn create_then_list_events() {
    let harness = Harness::authorized();

    let (status, body) = harness
        .send(
            Method::POST,
            "/calendar/events",
            Some(json!({
                "summary": "Planning",
                "start_time": "2030-05-01T09:00:00Z",
                "end_time": "2030-05-01T10:00:00",
                "description": "quarterly",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Event created");
    assert_eq!(body["details"]["eventId"], "evt1");

    let (status, body) = harness
        .send(Method::GET, "/calendar/events?max_results=5", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["summary"], "Planning");
    assert_eq!(events[0]["start"], "2030-05-01T09:00:00Z");
    assert_eq!(events[0]["end"], "2030-05-01T10:00:00Z");

    let query = harness.calendar.last_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.max_results, 5);
    assert_eq!(harness.refresher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn list_events_forwards_time_bounds() {
    let harness = Harness::authorized();

    let (status, _) = harness
        .send(
            Method::GET,
            "/calendar/events?time_min=2030-01-01T00:00:00Z&time_max=2030-02-01T00:00:00",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let query = harness.calendar.last_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.max_results, EventQuery::DEFAULT_MAX_RESULTS);
    assert_eq!(to_rfc3339(&query.time_min.unwrap()), "2030-01-01T00:00:00Z");
    assert_eq!(to_rfc3339(&query.time_max.unwrap()), "2030-02-01T00:00:00Z");
}

#[tokio::test]
async fn invalid_start_time_is_rejected_before_any_work() {
    let harness = Harness::authorized();

    let (status, body) = harness
        .send(
            Method::POST,
            "/calendar/events",
            Some(json!({
                "summary": "Bad",
                "start_time": "not-a-date",
                "end_time": "2030-05-01T10:00:00Z",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("start_time"));
    assert_eq!(harness.calendar.calls(), 0);
    assert_eq!(harness.store.load_count(), 0);
}

#[tokio::test]
async fn missing_field_and_bad_query_are_422() {
    let harness = Harness::authorized();

    let (status, body) = harness
        .send(Method::POST, "/calendar/events", Some(json!({ "summary": "No times" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());

    let (status, _) = harness
        .send(Method::GET, "/calendar/events?max_results=lots", None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = harness
        .send(Method::POST, "/tasks/lists", Some(json!({ "title": "  " })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(harness.calendar.calls(), 0);
    assert_eq!(harness.tasks.calls(), 0);
    assert_eq!(harness.store.load_count(), 0);
}

#[tokio::test]
async fn no_credential_with_disabled_authorization_is_401() {
    let harness = Harness::new(MemoryCredentialStore::new(), Arc::new(DisabledAuthorizer));

    let (status, body) = harness.send(Method::GET, "/calendar/events", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "authentication_failed");
    assert_eq!(harness.calendar.calls(), 0);
}

#[tokio::test]
async fn missing_credential_is_authorized_once_and_stored() {
    let authorizer = Arc::new(CountingAuthorizer::default());
    let harness = Harness::new(MemoryCredentialStore::new(), authorizer.clone());

    let (status, _) = harness.send(Method::GET, "/tasks/lists", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = harness.send(Method::GET, "/tasks/lists", None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.store.snapshot().unwrap().access_token, "authorized");
}

#[tokio::test]
async fn expired_credential_is_refreshed_transparently() {
    let mut expired = valid_credential();
    expired.expires_at = Some(Utc::now() - Duration::minutes(5));
    let harness = Harness::new(
        MemoryCredentialStore::with_credential(expired),
        Arc::new(DisabledAuthorizer),
    );

    let (status, _) = harness.send(Method::GET, "/calendar/events", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(harness.refresher.calls.load(Ordering::SeqCst), 1);
    let stored = harness.store.snapshot().unwrap();
    assert_eq!(stored.access_token, "refreshed");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn provider_not_found_maps_to_500() {
    let harness = Harness::authorized();

    let (status, body) = harness
        .send(Method::DELETE, "/calendar/events/missing", None)
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["provider_status"], 404);
    assert_eq!(body["code"], "not_found");
    assert!(body["detail"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn update_and_delete_event() {
    let harness = Harness::authorized();
    harness
        .send(
            Method::POST,
            "/calendar/events",
            Some(json!({
                "summary": "Standup",
                "start_time": "2030-05-01T09:00:00Z",
                "end_time": "2030-05-01T09:15:00Z",
            })),
        )
        .await;

    let (status, body) = harness
        .send(
            Method::PUT,
            "/calendar/events/evt1",
            Some(json!({ "summary": "Daily standup" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Event updated");
    assert_eq!(body["event"]["summary"], "Daily standup");
    assert_eq!(body["event"]["start"], "2030-05-01T09:00:00Z");

    let (status, body) = harness.send(Method::GET, "/calendar/events/evt1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "Daily standup");

    let (status, body) = harness.send(Method::DELETE, "/calendar/events/evt1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Event deleted");
    assert!(harness.calendar.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn task_lifecycle_with_status_only_update() {
    let harness = Harness::authorized();

    let (status, list) = harness
        .send(Method::POST, "/tasks/lists", Some(json!({ "title": "Errands" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["title"], "Errands");
    let list_id = list["id"].as_str().unwrap().to_string();

    let (status, task) = harness
        .send(
            Method::POST,
            &format!("/tasks/lists/{}/tasks", list_id),
            Some(json!({ "title": "Buy milk", "notes": "2 liters", "due": "2030-05-02T00:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "needsAction");
    let task_id = task["id"].as_str().unwrap().to_string();

    let (status, updated) = harness
        .send(
            Method::PUT,
            &format!("/tasks/lists/{}/tasks/{}", list_id, task_id),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["title"], "Buy milk");
    assert_eq!(updated["notes"], "2 liters");
    assert_eq!(updated["due"], "2030-05-02T00:00:00Z");

    let (status, tasks) = harness
        .send(Method::GET, &format!("/tasks/lists/{}/tasks", list_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks.as_array().unwrap().len(), 1);

    let (status, body) = harness
        .send(
            Method::DELETE,
            &format!("/tasks/lists/{}/tasks/{}", list_id, task_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task deleted");

    let (status, body) = harness
        .send(
            Method::GET,
            &format!("/tasks/lists/{}/tasks/{}", list_id, task_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["provider_status"], 404);
}

#[tokio::test]
async fn invalid_task_status_is_422() {
    let harness = Harness::authorized();

    let (status, _) = harness
        .send(
            Method::PUT,
            "/tasks/lists/list1/tasks/task1",
            Some(json!({ "status": "done" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(harness.tasks.calls(), 0);
}

#[tokio::test]
async fn login_reports_next_event_or_message() {
    let harness = Harness::authorized();

    let (status, body) = harness.send(Method::GET, "/login", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No upcoming events found.");

    harness
        .send(
            Method::POST,
            "/calendar/events",
            Some(json!({
                "summary": "Review",
                "start_time": "2030-06-01T14:00:00Z",
                "end_time": "2030-06-01T15:00:00Z",
            })),
        )
        .await;

    let (status, body) = harness.send(Method::GET, "/login", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "Review");
    assert_eq!(body["start"], "2030-06-01T14:00:00Z");
}

#[tokio::test]
async fn auth_status_describes_stored_credential() {
    let harness = Harness::authorized();
    let (status, body) = harness.send(Method::GET, "/auth/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["present"], true);
    assert_eq!(body["valid"], true);
    assert_eq!(body["scopes_ok"], true);
    assert_eq!(body["has_refresh_token"], true);

    let harness = Harness::new(MemoryCredentialStore::new(), Arc::new(DisabledAuthorizer));
    let (status, body) = harness.send(Method::GET, "/auth/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["present"], false);
}

#[tokio::test]
async fn cors_preflight_is_allowed() {
    let harness = Harness::authorized();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/calendar/events")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();

    let response = router(harness.state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
