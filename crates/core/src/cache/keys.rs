use std::fmt;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::Result;

/// Every backend operation the client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Me,
    Captcha,
    Login,
    Logout,
    GetTodolists,
    AddTodolist,
    RemoveTodolist,
    UpdateTodolistTitle,
    GetTasks,
    AddTask,
    RemoveTask,
    UpdateTask,
}

/// Static per-endpoint configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    pub name: &'static str,
    /// Whether a pending request flips the global status to `loading`.
    ///
    /// List fetches are refreshed routinely and would make the global
    /// indicator flicker, so they opt out.
    pub affects_global_status: bool,
}

impl Endpoint {
    pub const ALL: [Endpoint; 12] = [
        Endpoint::Me,
        Endpoint::Captcha,
        Endpoint::Login,
        Endpoint::Logout,
        Endpoint::GetTodolists,
        Endpoint::AddTodolist,
        Endpoint::RemoveTodolist,
        Endpoint::UpdateTodolistTitle,
        Endpoint::GetTasks,
        Endpoint::AddTask,
        Endpoint::RemoveTask,
        Endpoint::UpdateTask,
    ];

    pub fn config(self) -> EndpointConfig {
        let (name, affects_global_status) = match self {
            Endpoint::Me => ("me", true),
            Endpoint::Captcha => ("captcha", true),
            Endpoint::Login => ("login", true),
            Endpoint::Logout => ("logout", true),
            Endpoint::GetTodolists => ("getTodolists", false),
            Endpoint::AddTodolist => ("addTodolist", true),
            Endpoint::RemoveTodolist => ("removeTodolist", true),
            Endpoint::UpdateTodolistTitle => ("updateTodolistTitle", true),
            Endpoint::GetTasks => ("getTasks", false),
            Endpoint::AddTask => ("addTask", true),
            Endpoint::RemoveTask => ("removeTask", true),
            Endpoint::UpdateTask => ("updateTask", true),
        };
        EndpointConfig {
            name,
            affects_global_status,
        }
    }

    pub fn name(self) -> &'static str {
        self.config().name
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Identity of a cache entry: endpoint plus canonically serialized arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    endpoint: Endpoint,
    args: String,
}

impl CacheKey {
    /// Builds the key for `endpoint` called with `args`.
    ///
    /// Arguments go through `serde_json::Value`, whose objects keep their
    /// keys sorted, so two equal argument values always yield the same key.
    pub fn new<A: Serialize + ?Sized>(endpoint: Endpoint, args: &A) -> Result<Self> {
        Ok(Self::from_value(endpoint, &serialize_args(args)?))
    }

    /// Builds the key from already-serialized arguments.
    pub fn from_value(endpoint: Endpoint, args: &Value) -> Self {
        Self {
            endpoint,
            args: args.to_string(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn args(&self) -> &str {
        &self.args
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.endpoint, self.args)
    }
}

/// Serializes query arguments to their canonical JSON value.
pub fn serialize_args<A: Serialize + ?Sized>(args: &A) -> Result<Value> {
    Ok(serde_json::to_value(args)?)
}

/// Kinds of invalidation tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKind {
    Todolist,
    Task,
    Captcha,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Todolist => write!(f, "Todolist"),
            TagKind::Task => write!(f, "Task"),
            TagKind::Captcha => write!(f, "Captcha"),
        }
    }
}

/// A label attached to cache entries for bulk invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub kind: TagKind,
    pub id: Option<String>,
}

impl Tag {
    /// A tag that names every entity of `kind`.
    pub fn all(kind: TagKind) -> Self {
        Self { kind, id: None }
    }

    /// A tag that names one entity of `kind`.
    pub fn with_id(kind: TagKind, id: impl ToString) -> Self {
        Self {
            kind,
            id: Some(id.to_string()),
        }
    }

    /// Returns true if invalidating `self` should hit an entry providing `provided`.
    ///
    /// A tag without id matches every tag of its kind; a tag with id only
    /// matches the same id.
    pub fn matches(&self, provided: &Tag) -> bool {
        self.kind == provided.kind && (self.id.is_none() || self.id == provided.id)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{}", self.kind, id),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Tag provided by every tasks page of a todolist.
pub fn task_tag(todolist_id: Uuid) -> Tag {
    Tag::with_id(TagKind::Task, todolist_id)
}

/// Tag provided by the todolists query.
pub fn todolist_tag() -> Tag {
    Tag::all(TagKind::Todolist)
}

/// Tag provided by the captcha query.
pub fn captcha_tag() -> Tag {
    Tag::all(TagKind::Captcha)
}
