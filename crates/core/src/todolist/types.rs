use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Per-entity request status, tracked on the client only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Idle,
    Loading,
}

/// A todolist as the backend returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todolist {
    pub id: Uuid,
    pub title: String,
    pub added_date: NaiveDateTime,
    pub order: i64,
}

/// A todolist enriched with client-side state.
///
/// `entity_status` is never sent to the server; it is attached when the
/// todolists response is cached and flipped optimistically while a delete
/// is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainTodolist {
    #[serde(flatten)]
    pub todolist: Todolist,
    #[serde(default)]
    pub entity_status: EntityStatus,
}

impl From<Todolist> for DomainTodolist {
    fn from(todolist: Todolist) -> Self {
        Self {
            todolist,
            entity_status: EntityStatus::Idle,
        }
    }
}

impl DomainTodolist {
    pub fn id(&self) -> Uuid {
        self.todolist.id
    }

    pub fn title(&self) -> &str {
        &self.todolist.title
    }
}

/// Task progress as encoded by the backend (integers 0..=3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum TaskStatus {
    #[default]
    New,
    InProgress,
    Completed,
    Draft,
}

impl From<u8> for TaskStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::InProgress,
            2 => Self::Completed,
            3 => Self::Draft,
            _ => Self::New,
        }
    }
}

impl From<TaskStatus> for u8 {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::New => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed => 2,
            TaskStatus::Draft => 3,
        }
    }
}

impl TaskStatus {
    /// Returns true if the task is done.
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Draft => "draft",
        }
    }
}

/// Task priority as encoded by the backend (integers 0..=4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum TaskPriority {
    #[default]
    Low,
    Middle,
    Hi,
    Urgently,
    Later,
}

impl From<u8> for TaskPriority {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Middle,
            2 => Self::Hi,
            3 => Self::Urgently,
            4 => Self::Later,
            _ => Self::Low,
        }
    }
}

impl From<TaskPriority> for u8 {
    fn from(priority: TaskPriority) -> Self {
        match priority {
            TaskPriority::Low => 0,
            TaskPriority::Middle => 1,
            TaskPriority::Hi => 2,
            TaskPriority::Urgently => 3,
            TaskPriority::Later => 4,
        }
    }
}

/// A task belonging to exactly one todolist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub todo_list_id: Uuid,
    pub order: i64,
    pub added_date: NaiveDateTime,
    pub deadline: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "crate::serde::deserialize_optional_string")]
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub start_date: Option<NaiveDateTime>,
}

/// One page of tasks for a todolist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTasksResponse {
    pub items: Vec<Task>,
    pub total_count: u64,
    pub error: Option<String>,
}

impl GetTasksResponse {
    /// Finds a task on this page by id.
    pub fn find(&self, task_id: Uuid) -> Option<&Task> {
        self.items.iter().find(|task| task.id == task_id)
    }

    /// Finds a task on this page by id, mutably.
    pub fn find_mut(&mut self, task_id: Uuid) -> Option<&mut Task> {
        self.items.iter_mut().find(|task| task.id == task_id)
    }
}

/// Payload of `auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeData {
    pub id: u64,
    pub email: String,
    pub login: String,
}

/// Payload of a successful `auth/login`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub user_id: u64,
    pub token: String,
}

/// Response of `security/get-captcha-url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaResponse {
    pub url: String,
}

/// Payload wrapper for endpoints that return the created/updated entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemData<T> {
    pub item: T,
}

/// Payload for endpoints whose `data` carries nothing useful.
pub type EmptyData = Value;
