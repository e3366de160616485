//! Google Tasks API v1 client.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, TaskProvider};
use crate::resource::{NewTask, Task, TaskList, TaskPatch, TaskStatus, to_rfc3339};

use super::config::GoogleConfig;
use super::http::ApiClient;
use super::tokens::Credential;

/// Base URL for Google Tasks API v1.
pub const TASKS_API_BASE: &str = "https://tasks.googleapis.com/tasks/v1";

const TASK_LISTS_PATH: &str = "/users/@me/lists";

/// Page size for list calls. Only the first page is returned.
const MAX_RESULTS: &str = "100";

/// Google Tasks client.
#[derive(Debug, Clone)]
pub struct GoogleTasksClient {
    api: ApiClient,
}

impl GoogleTasksClient {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self {
            api: ApiClient::new("tasks", TASKS_API_BASE, config.timeout, &config.user_agent)?,
        })
    }

    /// Points the client at another API root (used against mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api = self.api.with_base_url(base_url);
        self
    }

    fn tasks_path(list_id: &str) -> String {
        format!("/lists/{}/tasks", urlencoding::encode(list_id))
    }

    fn task_path(list_id: &str, task_id: &str) -> String {
        format!("{}/{}", Self::tasks_path(list_id), urlencoding::encode(task_id))
    }

    pub async fn list_task_lists(&self, credential: &Credential) -> ProviderResult<Vec<TaskList>> {
        let list: ListResponse<TaskList> = self
            .api
            .get(credential, TASK_LISTS_PATH, &[("maxResults", MAX_RESULTS.to_string())])
            .await?;
        debug!("fetched {} task lists", list.items.len());
        Ok(list.items)
    }

    pub async fn insert_task_list(&self, credential: &Credential, title: &str) -> ProviderResult<TaskList> {
        let created: TaskList = self
            .api
            .send_json(Method::POST, credential, TASK_LISTS_PATH, &json!({ "title": title }))
            .await?;
        debug!(list_id = %created.id, "created task list");
        Ok(created)
    }

    pub async fn list_tasks(&self, credential: &Credential, list_id: &str) -> ProviderResult<Vec<Task>> {
        let list: ListResponse<Task> = self
            .api
            .get(
                credential,
                &Self::tasks_path(list_id),
                &[("maxResults", MAX_RESULTS.to_string())],
            )
            .await?;
        debug!(list_id, "fetched {} tasks", list.items.len());
        Ok(list.items)
    }

    pub async fn get_task(&self, credential: &Credential, list_id: &str, task_id: &str) -> ProviderResult<Task> {
        self.api
            .get(credential, &Self::task_path(list_id, task_id), &[])
            .await
    }

    pub async fn insert_task(&self, credential: &Credential, list_id: &str, task: &NewTask) -> ProviderResult<Task> {
        let mut body = json!({
            "title": task.title,
            "status": TaskStatus::NeedsAction.as_str(),
        });
        if let Some(notes) = &task.notes {
            body["notes"] = json!(notes);
        }
        if let Some(due) = &task.due {
            body["due"] = json!(to_rfc3339(due));
        }

        let created: Task = self
            .api
            .send_json(Method::POST, credential, &Self::tasks_path(list_id), &body)
            .await?;
        debug!(list_id, task_id = %created.id, "created task");
        Ok(created)
    }

    /// Fetches the raw task, overlays the patch and writes it back whole.
    pub async fn update_task(
        &self,
        credential: &Credential,
        list_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> ProviderResult<Task> {
        let path = Self::task_path(list_id, task_id);
        if patch.is_empty() {
            debug!(list_id, task_id, "empty patch, returning current task");
            return self.api.get(credential, &path, &[]).await;
        }

        let mut current: Value = self.api.get(credential, &path, &[]).await?;

        let object = current.as_object_mut().ok_or_else(|| {
            ProviderError::invalid_response("task resource is not a JSON object")
                .with_provider(self.api.provider())
        })?;
        merge_task(object, patch);

        let updated: Task = self
            .api
            .send_json(Method::PUT, credential, &path, &current)
            .await?;
        debug!(list_id, task_id, status = updated.status.as_str(), "updated task");
        Ok(updated)
    }

    pub async fn delete_task(&self, credential: &Credential, list_id: &str, task_id: &str) -> ProviderResult<()> {
        self.api
            .delete(credential, &Self::task_path(list_id, task_id))
            .await?;
        debug!(list_id, task_id, "deleted task");
        Ok(())
    }
}

fn merge_task(object: &mut Map<String, Value>, patch: &TaskPatch) {
    if let Some(title) = &patch.title {
        object.insert("title".into(), json!(title));
    }
    if let Some(notes) = &patch.notes {
        object.insert("notes".into(), json!(notes));
    }
    if let Some(due) = &patch.due {
        object.insert("due".into(), json!(to_rfc3339(due)));
    }
    if let Some(status) = patch.status {
        object.insert("status".into(), json!(status.as_str()));
        // Reopened tasks must not keep their completion timestamp.
        if status == TaskStatus::NeedsAction {
            object.remove("completed");
        }
    }
}

impl TaskProvider for GoogleTasksClient {
    fn name(&self) -> &str {
        self.api.provider()
    }

    fn list_task_lists<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, ProviderResult<Vec<TaskList>>> {
        Box::pin(GoogleTasksClient::list_task_lists(self, credential))
    }

    fn insert_task_list<'a>(
        &'a self,
        credential: &'a Credential,
        title: &'a str,
    ) -> BoxFuture<'a, ProviderResult<TaskList>> {
        Box::pin(GoogleTasksClient::insert_task_list(self, credential, title))
    }

    fn list_tasks<'a>(
        &'a self,
        credential: &'a Credential,
        list_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<Task>>> {
        Box::pin(GoogleTasksClient::list_tasks(self, credential, list_id))
    }

    fn get_task<'a>(
        &'a self,
        credential: &'a Credential,
        list_id: &'a str,
        task_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Task>> {
        Box::pin(GoogleTasksClient::get_task(self, credential, list_id, task_id))
    }

    fn insert_task<'a>(
        &'a self,
        credential: &'a Credential,
        list_id: &'a str,
        task: NewTask,
    ) -> BoxFuture<'a, ProviderResult<Task>> {
        Box::pin(async move { GoogleTasksClient::insert_task(self, credential, list_id, &task).await })
    }

    fn update_task<'a>(
        &'a self,
        credential: &'a Credential,
        list_id: &'a str,
        task_id: &'a str,
        patch: TaskPatch,
    ) -> BoxFuture<'a, ProviderResult<Task>> {
        Box::pin(async move {
            GoogleTasksClient::update_task(self, credential, list_id, task_id, &patch).await
        })
    }

    fn delete_task<'a>(
        &'a self,
        credential: &'a Credential,
        list_id: &'a str,
        task_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(GoogleTasksClient::delete_task(self, credential, list_id, task_id))
    }
}

/// Response from the `tasklists.list` and `tasks.list` endpoints.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}
