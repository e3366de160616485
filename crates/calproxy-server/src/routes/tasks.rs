//! `/tasks/lists` handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use calproxy_providers::{NewTask, Task, TaskList, TaskPatch, TaskStatus};
use serde::Deserialize;
use tracing::info;

use super::{MessageResponse, json_body, parse_optional_time, require_non_blank};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTaskListRequest {
    title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTaskRequest {
    title: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    due: Option<String>,
}

impl CreateTaskRequest {
    fn into_new_task(self) -> Result<NewTask, ApiError> {
        require_non_blank("title", &self.title)?;
        Ok(NewTask {
            due: parse_optional_time("due", self.due.as_deref())?,
            title: self.title,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UpdateTaskRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    status: Option<TaskStatus>,
}

impl UpdateTaskRequest {
    fn into_patch(self) -> Result<TaskPatch, ApiError> {
        if let Some(title) = &self.title {
            require_non_blank("title", title)?;
        }
        Ok(TaskPatch {
            due: parse_optional_time("due", self.due.as_deref())?,
            title: self.title,
            notes: self.notes,
            status: self.status,
        })
    }
}

pub(crate) async fn list_task_lists(
    State(state): State<AppState>,
) -> Result<Json<Vec<TaskList>>, ApiError> {
    let credential = state.credential().await?;
    Ok(Json(state.tasks.list_task_lists(&credential).await?))
}

pub(crate) async fn create_task_list(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskListRequest>, JsonRejection>,
) -> Result<Json<TaskList>, ApiError> {
    let request = json_body(payload)?;
    require_non_blank("title", &request.title)?;

    let credential = state.credential().await?;
    let list = state
        .tasks
        .insert_task_list(&credential, &request.title)
        .await?;
    info!(list_id = %list.id, "task list created");
    Ok(Json(list))
}

pub(crate) async fn list_tasks(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let credential = state.credential().await?;
    Ok(Json(state.tasks.list_tasks(&credential, &list_id).await?))
}

pub(crate) async fn get_task(
    State(state): State<AppState>,
    Path((list_id, task_id)): Path<(String, String)>,
) -> Result<Json<Task>, ApiError> {
    let credential = state.credential().await?;
    Ok(Json(state.tasks.get_task(&credential, &list_id, &task_id).await?))
}

pub(crate) async fn create_task(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let task = json_body(payload)?.into_new_task()?;

    let credential = state.credential().await?;
    let created = state.tasks.insert_task(&credential, &list_id, task).await?;
    info!(%list_id, task_id = %created.id, "task created");
    Ok(Json(created))
}

pub(crate) async fn update_task(
    State(state): State<AppState>,
    Path((list_id, task_id)): Path<(String, String)>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let patch = json_body(payload)?.into_patch()?;

    let credential = state.credential().await?;
    let task = state
        .tasks
        .update_task(&credential, &list_id, &task_id, patch)
        .await?;
    info!(%list_id, %task_id, status = task.status.as_str(), "task updated");
    Ok(Json(task))
}

pub(crate) async fn delete_task(
    State(state): State<AppState>,
    Path((list_id, task_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let credential = state.credential().await?;
    state
        .tasks
        .delete_task(&credential, &list_id, &task_id)
        .await?;
    info!(%list_id, %task_id, "task deleted");
    Ok(MessageResponse::new("Task deleted"))
}
