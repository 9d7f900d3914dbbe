use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{Task, TaskPriority, TaskStatus};

/// Number of tasks requested per page.
pub const PAGE_SIZE: u32 = 4;

/// Body for creating a todolist or a task, and for renaming a todolist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRequest {
    pub title: String,
}

impl TitleRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Pagination parameters of a tasks fetch, as cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageParams {
    pub page: u32,
}

/// Arguments of the `getTasks` query. These are what the query cache keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTasksArgs {
    pub todolist_id: Uuid,
    pub params: PageParams,
}

impl GetTasksArgs {
    pub fn new(todolist_id: Uuid, page: u32) -> Self {
        Self {
            todolist_id,
            params: PageParams { page },
        }
    }

    /// Query string sent to the backend: the page plus the fixed page size.
    pub fn query(&self) -> TasksQuery {
        TasksQuery {
            page: self.params.page,
            count: PAGE_SIZE,
        }
    }
}

/// Query string of `GET todo-lists/{id}/tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TasksQuery {
    pub page: u32,
    pub count: u32,
}

/// Full body of `PUT todo-lists/{id}/tasks/{taskId}`.
///
/// The backend replaces every mutable field, so the model is always built
/// from the current task plus the requested changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskModel {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub start_date: Option<NaiveDateTime>,
    pub deadline: Option<NaiveDateTime>,
}

impl From<&Task> for UpdateTaskModel {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            start_date: task.start_date,
            deadline: task.deadline,
        }
    }
}

impl UpdateTaskModel {
    /// Writes every field of the model into a cached task.
    pub fn apply_to(&self, task: &mut Task) {
        task.title = self.title.clone();
        task.description = self.description.clone();
        task.status = self.status;
        task.priority = self.priority;
        task.start_date = self.start_date;
        task.deadline = self.deadline;
    }
}

/// A partial set of task changes requested by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub start_date: Option<Option<NaiveDateTime>>,
    pub deadline: Option<Option<NaiveDateTime>>,
}

impl TaskChanges {
    /// Changes that only move the task to another status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Changes that only rename the task.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Builds the full update model by applying these changes over `task`.
    pub fn to_model(&self, task: &Task) -> UpdateTaskModel {
        let mut model = UpdateTaskModel::from(task);
        self.apply_to_model(&mut model);
        model
    }

    /// Writes the requested fields into `model`, leaving the rest untouched.
    pub fn apply_to_model(&self, model: &mut UpdateTaskModel) {
        if let Some(title) = &self.title {
            model.title = title.clone();
        }
        if let Some(description) = &self.description {
            model.description = description.clone();
        }
        if let Some(status) = self.status {
            model.status = status;
        }
        if let Some(priority) = self.priority {
            model.priority = priority;
        }
        if let Some(start_date) = self.start_date {
            model.start_date = start_date;
        }
        if let Some(deadline) = self.deadline {
            model.deadline = deadline;
        }
    }

    /// Returns true if no field is requested.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Credentials sent to `POST auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginArgs {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha: Option<String>,
}
