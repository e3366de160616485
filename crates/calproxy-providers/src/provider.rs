//! Provider capability traits.
//!
//! [`CalendarProvider`] and [`TaskProvider`] are the seams between the HTTP
//! layer and the remote services. Implementations receive the credential per
//! call and never cache it; acquiring one is the lifecycle manager's job.

use std::future::Future;
use std::pin::Pin;

use crate::error::ProviderResult;
use crate::google::Credential;
use crate::resource::{Event, EventPatch, EventQuery, NewEvent, NewTask, Task, TaskList, TaskPatch};

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe so they can be shared as
/// `Arc<dyn CalendarProvider>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Event operations on the user's primary calendar.
pub trait CalendarProvider: Send + Sync {
    /// Returns the name of this provider (e.g. "calendar").
    fn name(&self) -> &str;

    /// Lists upcoming events, expanded to single instances and ordered by
    /// start time.
    fn list_events<'a>(
        &'a self,
        credential: &'a Credential,
        query: EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<Event>>>;

    fn get_event<'a>(
        &'a self,
        credential: &'a Credential,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Event>>;

    /// Creates an event and returns it with its assigned id.
    fn insert_event<'a>(
        &'a self,
        credential: &'a Credential,
        event: NewEvent,
    ) -> BoxFuture<'a, ProviderResult<Event>>;

    /// Applies `patch` on top of the current event. Fields the patch leaves
    /// unset keep their remote value.
    fn update_event<'a>(
        &'a self,
        credential: &'a Credential,
        event_id: &'a str,
        patch: EventPatch,
    ) -> BoxFuture<'a, ProviderResult<Event>>;

    fn delete_event<'a>(
        &'a self,
        credential: &'a Credential,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;
}

/// Task list and task operations.
pub trait TaskProvider: Send + Sync {
    /// Returns the name of this provider (e.g. "tasks").
    fn name(&self) -> &str;

    fn list_task_lists<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, ProviderResult<Vec<TaskList>>>;

    fn insert_task_list<'a>(
        &'a self,
        credential: &'a Credential,
        title: &'a str,
    ) -> BoxFuture<'a, ProviderResult<TaskList>>;

    fn list_tasks<'a>(
        &'a self,
        credential: &'a Credential,
        list_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<Task>>>;

    fn get_task<'a>(
        &'a self,
        credential: &'a Credential,
        list_id: &'a str,
        task_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Task>>;

    /// Creates a task in `needsAction` state.
    fn insert_task<'a>(
        &'a self,
        credential: &'a Credential,
        list_id: &'a str,
        task: NewTask,
    ) -> BoxFuture<'a, ProviderResult<Task>>;

    /// Applies `patch` on top of the current task.
    fn update_task<'a>(
        &'a self,
        credential: &'a Credential,
        list_id: &'a str,
        task_id: &'a str,
        patch: TaskPatch,
    ) -> BoxFuture<'a, ProviderResult<Task>>;

    fn delete_task<'a>(
        &'a self,
        credential: &'a Credential,
        list_id: &'a str,
        task_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;
}
