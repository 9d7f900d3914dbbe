//! In-memory backend implementing [`RemoteApi`].
//!
//! Behaves like the real server for the happy path and lets tests script
//! login outcomes, delay task fetches and hold task updates until released.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{oneshot, Mutex, RwLock};
use todosync_core::envelope::{ResponseEnvelope, ResultCode};
use todosync_core::todolist::{
    CaptchaResponse, EmptyData, GetTasksArgs, GetTasksResponse, ItemData, LoginArgs, LoginData,
    MeData, Task, TaskPriority, TaskStatus, Todolist, UpdateTaskModel, PAGE_SIZE,
};
use uuid::Uuid;

use crate::client::RemoteApi;
use crate::error::{ClientError, Result};

/// Token issued by a successful login.
pub const ISSUED_TOKEN: &str = "inmemory-token";

/// How a scripted request settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Behave like the server would.
    Apply,
    /// Answer with this result code and message.
    Domain(ResultCode, String),
    /// Fail below the envelope, like a dropped connection.
    Transport,
}

/// Per-endpoint request counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub get_todolists: AtomicUsize,
    pub get_tasks: AtomicUsize,
    pub update_task: AtomicUsize,
    pub login: AtomicUsize,
    pub captcha: AtomicUsize,
}

#[derive(Debug, Default)]
struct ServerState {
    todolists: Vec<Todolist>,
    tasks: HashMap<Uuid, Vec<Task>>,
    token: Option<String>,
    last_login: Option<LoginArgs>,
}

/// In-memory stand-in for the todolist backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryApi {
    state: Arc<RwLock<ServerState>>,
    login_script: Arc<Mutex<VecDeque<Scripted>>>,
    update_gates: Arc<Mutex<VecDeque<oneshot::Receiver<Scripted>>>>,
    tasks_delay: Arc<RwLock<Duration>>,
    captcha_url: Arc<RwLock<String>>,
    /// While set, `auth/me` fails like a dropped connection.
    me_offline: Arc<AtomicBool>,
    calls: Arc<CallCounts>,
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Seeds a todolist and returns it.
    pub async fn seed_todolist(&self, title: &str) -> Todolist {
        let mut state = self.state.write().await;
        let todolist = Todolist {
            id: Uuid::new_v4(),
            title: title.to_string(),
            added_date: Utc::now().naive_utc(),
            order: -(state.todolists.len() as i64),
        };
        state.todolists.insert(0, todolist.clone());
        state.tasks.insert(todolist.id, Vec::new());
        todolist
    }

    /// Seeds a task at the end of a todolist and returns it.
    pub async fn seed_task(&self, todolist_id: Uuid, title: &str) -> Task {
        let mut state = self.state.write().await;
        let tasks = state.tasks.entry(todolist_id).or_default();
        let task = new_task(todolist_id, title, tasks.len() as i64);
        tasks.push(task.clone());
        task
    }

    pub async fn server_task(&self, todolist_id: Uuid, task_id: Uuid) -> Option<Task> {
        let state = self.state.read().await;
        state
            .tasks
            .get(&todolist_id)?
            .iter()
            .find(|task| task.id == task_id)
            .cloned()
    }

    /// Queues the outcome of the next login call.
    pub async fn script_login(&self, outcome: Scripted) {
        self.login_script.lock().await.push_back(outcome);
    }

    /// Holds the next task update until the returned sender decides its
    /// outcome.
    pub async fn gate_update(&self) -> oneshot::Sender<Scripted> {
        let (tx, rx) = oneshot::channel();
        self.update_gates.lock().await.push_back(rx);
        tx
    }

    pub async fn set_tasks_delay(&self, delay: Duration) {
        *self.tasks_delay.write().await = delay;
    }

    pub async fn set_captcha_url(&self, url: &str) {
        *self.captcha_url.write().await = url.to_string();
    }

    pub fn set_me_offline(&self, offline: bool) {
        self.me_offline.store(offline, Ordering::SeqCst);
    }

    pub async fn last_login(&self) -> Option<LoginArgs> {
        self.state.read().await.last_login.clone()
    }

    async fn authorized(&self) -> bool {
        self.state.read().await.token.as_deref() == Some(ISSUED_TOKEN)
    }
}

fn new_task(todolist_id: Uuid, title: &str, order: i64) -> Task {
    Task {
        id: Uuid::new_v4(),
        title: title.to_string(),
        status: TaskStatus::New,
        todo_list_id: todolist_id,
        order,
        added_date: Utc::now().naive_utc(),
        deadline: None,
        description: None,
        priority: TaskPriority::Low,
        start_date: None,
    }
}

fn rejected<T>(message: &str) -> ResponseEnvelope<T> {
    ResponseEnvelope::failure(ResultCode::Error, vec![message.to_string()])
}

fn dropped_connection() -> ClientError {
    ClientError::ServerError {
        status: 503,
        message: "connection reset".to_string(),
    }
}

fn empty() -> ResponseEnvelope<EmptyData> {
    ResponseEnvelope::success(EmptyData::Object(Default::default()))
}

#[async_trait]
impl RemoteApi for InMemoryApi {
    async fn set_token(&self, token: Option<String>) {
        self.state.write().await.token = token;
    }

    async fn me(&self) -> Result<ResponseEnvelope<MeData>> {
        if self.me_offline.load(Ordering::SeqCst) {
            return Err(dropped_connection());
        }
        if !self.authorized().await {
            return Ok(rejected("You are not authorized"));
        }
        Ok(ResponseEnvelope::success(MeData {
            id: 1,
            email: "free@samuraijs.com".to_string(),
            login: "free".to_string(),
        }))
    }

    async fn captcha_url(&self) -> Result<CaptchaResponse> {
        self.calls.captcha.fetch_add(1, Ordering::SeqCst);
        Ok(CaptchaResponse {
            url: self.captcha_url.read().await.clone(),
        })
    }

    async fn login(&self, args: &LoginArgs) -> Result<ResponseEnvelope<LoginData>> {
        self.calls.login.fetch_add(1, Ordering::SeqCst);
        self.state.write().await.last_login = Some(args.clone());

        let script = self.login_script.lock().await.pop_front();
        match script.unwrap_or(Scripted::Apply) {
            Scripted::Apply => Ok(ResponseEnvelope::success(LoginData {
                user_id: 1,
                token: ISSUED_TOKEN.to_string(),
            })),
            Scripted::Domain(code, message) => Ok(ResponseEnvelope::failure(code, vec![message])),
            Scripted::Transport => Err(dropped_connection()),
        }
    }

    async fn logout(&self) -> Result<ResponseEnvelope<EmptyData>> {
        self.state.write().await.token = None;
        Ok(empty())
    }

    async fn get_todolists(&self) -> Result<Vec<Todolist>> {
        self.calls.get_todolists.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.read().await.todolists.clone())
    }

    async fn create_todolist(&self, title: &str) -> Result<ResponseEnvelope<ItemData<Todolist>>> {
        if title.trim().is_empty() {
            return Ok(rejected("Title is required"));
        }
        let item = self.seed_todolist(title).await;
        Ok(ResponseEnvelope::success(ItemData { item }))
    }

    async fn delete_todolist(&self, id: Uuid) -> Result<ResponseEnvelope<EmptyData>> {
        let mut state = self.state.write().await;
        let before = state.todolists.len();
        state.todolists.retain(|todolist| todolist.id != id);
        if state.todolists.len() == before {
            return Ok(rejected("Todolist not found"));
        }
        state.tasks.remove(&id);
        Ok(empty())
    }

    async fn update_todolist_title(
        &self,
        id: Uuid,
        title: &str,
    ) -> Result<ResponseEnvelope<EmptyData>> {
        let mut state = self.state.write().await;
        match state.todolists.iter_mut().find(|todolist| todolist.id == id) {
            Some(todolist) => {
                todolist.title = title.to_string();
                Ok(empty())
            }
            None => Ok(rejected("Todolist not found")),
        }
    }

    async fn get_tasks(&self, args: &GetTasksArgs) -> Result<GetTasksResponse> {
        self.calls.get_tasks.fetch_add(1, Ordering::SeqCst);
        let delay = *self.tasks_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read().await;
        let tasks = state.tasks.get(&args.todolist_id).cloned().unwrap_or_default();
        let page = args.params.page.max(1) as usize;
        Ok(GetTasksResponse {
            total_count: tasks.len() as u64,
            items: tasks
                .into_iter()
                .skip((page - 1) * PAGE_SIZE as usize)
                .take(PAGE_SIZE as usize)
                .collect(),
            error: None,
        })
    }

    async fn create_task(
        &self,
        todolist_id: Uuid,
        title: &str,
    ) -> Result<ResponseEnvelope<ItemData<Task>>> {
        if !self.state.read().await.tasks.contains_key(&todolist_id) {
            return Ok(rejected("Todolist not found"));
        }
        let item = self.seed_task(todolist_id, title).await;
        Ok(ResponseEnvelope::success(ItemData { item }))
    }

    async fn delete_task(
        &self,
        todolist_id: Uuid,
        task_id: Uuid,
    ) -> Result<ResponseEnvelope<EmptyData>> {
        let mut state = self.state.write().await;
        let Some(tasks) = state.tasks.get_mut(&todolist_id) else {
            return Ok(rejected("Todolist not found"));
        };
        let before = tasks.len();
        tasks.retain(|task| task.id != task_id);
        if tasks.len() == before {
            return Ok(rejected("Task not found"));
        }
        Ok(empty())
    }

    async fn update_task(
        &self,
        todolist_id: Uuid,
        task_id: Uuid,
        model: &UpdateTaskModel,
    ) -> Result<ResponseEnvelope<ItemData<Task>>> {
        self.calls.update_task.fetch_add(1, Ordering::SeqCst);

        let gate = self.update_gates.lock().await.pop_front();
        let outcome = match gate {
            Some(rx) => rx.await.unwrap_or(Scripted::Transport),
            None => Scripted::Apply,
        };

        match outcome {
            Scripted::Apply => {
                let mut state = self.state.write().await;
                let task = state
                    .tasks
                    .get_mut(&todolist_id)
                    .and_then(|tasks| tasks.iter_mut().find(|task| task.id == task_id));
                match task {
                    Some(task) => {
                        model.apply_to(task);
                        Ok(ResponseEnvelope::success(ItemData { item: task.clone() }))
                    }
                    None => Ok(rejected("Task not found")),
                }
            }
            Scripted::Domain(code, message) => Ok(ResponseEnvelope::failure(code, vec![message])),
            Scripted::Transport => Err(dropped_connection()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tasks_are_paginated() {
        let api = InMemoryApi::new();
        let list = api.seed_todolist("Groceries").await;
        for n in 0..6 {
            api.seed_task(list.id, &format!("task {}", n)).await;
        }

        let first = api.get_tasks(&GetTasksArgs::new(list.id, 1)).await.unwrap();
        let second = api.get_tasks(&GetTasksArgs::new(list.id, 2)).await.unwrap();

        assert_eq!(first.items.len(), 4);
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.total_count, 6);
        assert_eq!(second.items[0].title, "task 4");
    }

    #[tokio::test]
    async fn test_me_requires_issued_token() {
        let api = InMemoryApi::new();
        assert!(!api.me().await.unwrap().is_success());

        api.set_token(Some(ISSUED_TOKEN.to_string())).await;
        assert!(api.me().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_scripted_login() {
        let api = InMemoryApi::new();
        api.script_login(Scripted::Transport).await;
        let args = LoginArgs {
            email: "free@samuraijs.com".to_string(),
            password: "free".to_string(),
            remember_me: false,
            captcha: None,
        };

        assert!(api.login(&args).await.is_err());
        assert!(api.login(&args).await.unwrap().is_success());
        assert_eq!(InMemoryApi::count(&api.calls().login), 2);
    }
}
