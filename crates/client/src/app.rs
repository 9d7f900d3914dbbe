//! Application facade: every user-facing operation, wired through the query
//! runner, the optimistic coordinator and the session state.

use std::sync::Arc;

use todosync_core::cache::{captcha_tag, task_tag, todolist_tag, CacheKey, Endpoint, Tag};
use todosync_core::envelope::{EnvelopeOutcome, NETWORK_ERROR_MESSAGE};
use todosync_core::session::{SessionAction, SessionState};
use todosync_core::todolist::{
    CaptchaResponse, DomainTodolist, EntityStatus, GetTasksArgs, GetTasksResponse, LoginArgs,
    MeData, Task, TaskChanges, Todolist, UpdateTaskModel,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::RemoteApi;
use crate::error::{ClientError, Result};
use crate::optimistic;
use crate::query::QueryClient;
use crate::token::TokenStore;

/// Form-level message when a login is rejected without a message.
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";

/// What a login attempt produced, as the login form shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    /// The backend wants a captcha; `captcha_url` is the fresh image.
    CaptchaRequired {
        captcha_url: Option<String>,
        message: String,
    },
    Rejected {
        message: String,
    },
}

/// The todolist client.
#[derive(Clone)]
pub struct TodoApp {
    api: Arc<dyn RemoteApi>,
    queries: QueryClient,
    tokens: Arc<dyn TokenStore>,
}

impl TodoApp {
    pub fn new(api: Arc<dyn RemoteApi>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            queries: QueryClient::new(),
            tokens,
        }
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    pub async fn session(&self) -> SessionState {
        self.queries.session().await
    }

    /// Surfaces domain errors to the session, then invalidates `tags`
    /// whatever the outcome. Transport errors were surfaced by the runner.
    async fn settle<T>(&self, result: Result<T>, tags: &[Tag]) -> Result<T> {
        if let Err(ClientError::Domain(e)) = &result {
            warn!(error = %e, "request rejected by server");
            self.queries
                .dispatch(SessionAction::SetError(Some(e.user_message())))
                .await;
        }
        self.queries.invalidate_tags(tags).await;
        result
    }

    /// Restores a persisted token and checks it against `auth/me`.
    ///
    /// Returns whether the session is logged in afterwards. A rejected token
    /// leaves the session logged out without surfacing an error; an
    /// unreachable backend leaves it logged out too. Only local token store
    /// failures are returned as errors.
    pub async fn initialize(&self) -> Result<bool> {
        let Some(token) = self.tokens.load()? else {
            debug!("no stored token");
            return Ok(false);
        };
        self.api.set_token(Some(token)).await;

        let envelope = match self.queries.execute(Endpoint::Me, self.api.me()).await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "could not verify stored token");
                return Ok(false);
            }
        };
        let logged_in = envelope.is_success();
        self.queries
            .dispatch(SessionAction::SetLoggedIn(logged_in))
            .await;
        info!(logged_in, "session restored");
        Ok(logged_in)
    }

    /// Current user; marks the session logged in on success.
    pub async fn me(&self) -> Result<MeData> {
        let result = self
            .queries
            .execute(Endpoint::Me, self.api.me())
            .await
            .and_then(|envelope| Ok(envelope.into_result()?));
        if result.is_ok() {
            self.queries.dispatch(SessionAction::SetLoggedIn(true)).await;
        }
        self.settle(result, &[]).await
    }

    /// Fetches a new captcha image URL.
    pub async fn captcha(&self) -> Result<String> {
        self.queries.invalidate_tags(&[captcha_tag()]).await;
        let api = self.api.clone();
        let response: CaptchaResponse = self
            .queries
            .query(Endpoint::Captcha, &(), vec![captcha_tag()], move || async move {
                api.captcha_url().await
            })
            .await?;
        Ok(response.url)
    }

    /// Marks a captcha shown earlier as active, so the next login sends
    /// its answer.
    pub async fn resume_captcha(&self, url: String) {
        self.queries
            .dispatch(SessionAction::SetCaptchaUrl(Some(url)))
            .await;
    }

    /// Logs in.
    ///
    /// The captcha answer is only sent while a captcha is active. Every
    /// failure is returned as a form-level outcome rather than an error,
    /// except for local token persistence failures.
    pub async fn login(&self, mut args: LoginArgs) -> Result<LoginOutcome> {
        if self.session().await.captcha_url.is_none() {
            args.captcha = None;
        }

        let envelope = match self
            .queries
            .execute(Endpoint::Login, self.api.login(&args))
            .await
        {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "login request failed");
                return Ok(LoginOutcome::Rejected {
                    message: NETWORK_ERROR_MESSAGE.to_string(),
                });
            }
        };

        match envelope.outcome(LOGIN_FAILED_MESSAGE) {
            EnvelopeOutcome::Success(data) => {
                self.tokens.save(&data.token)?;
                self.api.set_token(Some(data.token)).await;
                self.queries.dispatch(SessionAction::SetLoggedIn(true)).await;
                self.queries.dispatch(SessionAction::SetCaptchaUrl(None)).await;
                info!(user_id = data.user_id, "logged in");
                Ok(LoginOutcome::LoggedIn)
            }
            EnvelopeOutcome::CaptchaRequired { message } => {
                let captcha_url = match self.captcha().await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!(error = %e, "captcha fetch failed");
                        None
                    }
                };
                if captcha_url.is_some() {
                    self.queries
                        .dispatch(SessionAction::SetCaptchaUrl(captcha_url.clone()))
                        .await;
                }
                Ok(LoginOutcome::CaptchaRequired {
                    captcha_url,
                    message,
                })
            }
            EnvelopeOutcome::Rejected { message } => Ok(LoginOutcome::Rejected { message }),
        }
    }

    /// Logs out, dropping the stored token, the session and every cached
    /// query.
    pub async fn logout(&self) -> Result<()> {
        let result = self
            .queries
            .execute(Endpoint::Logout, self.api.logout())
            .await
            .and_then(|envelope| Ok(envelope.check()?));
        self.settle(result, &[]).await?;

        self.tokens.clear()?;
        self.api.set_token(None).await;
        self.queries.dispatch(SessionAction::Reset).await;
        self.queries.reset_cache().await;
        info!("logged out");
        Ok(())
    }

    pub async fn todolists(&self) -> Result<Vec<DomainTodolist>> {
        let api = self.api.clone();
        self.queries
            .query(Endpoint::GetTodolists, &(), vec![todolist_tag()], move || async move {
                let todolists = api.get_todolists().await;
                todolists.map(|t| t.into_iter().map(DomainTodolist::from).collect::<Vec<_>>())
            })
            .await
    }

    pub async fn add_todolist(&self, title: &str) -> Result<Todolist> {
        let result = self
            .queries
            .execute(Endpoint::AddTodolist, self.api.create_todolist(title))
            .await
            .and_then(|envelope| Ok(envelope.into_result()?.item));
        self.settle(result, &[todolist_tag()]).await
    }

    /// Deletes a todolist, showing it as loading until the server answers.
    pub async fn remove_todolist(&self, id: Uuid) -> Result<()> {
        let record =
            optimistic::set_todolist_status(self.queries.cache(), id, EntityStatus::Loading).await?;

        let result = self
            .queries
            .execute(Endpoint::RemoveTodolist, self.api.delete_todolist(id))
            .await
            .and_then(|envelope| Ok(envelope.check()?));
        if result.is_err() {
            optimistic::undo_record(self.queries.cache(), record.as_ref()).await;
        }
        self.settle(result, &[todolist_tag()]).await
    }

    pub async fn update_todolist_title(&self, id: Uuid, title: &str) -> Result<()> {
        let result = self
            .queries
            .execute(
                Endpoint::UpdateTodolistTitle,
                self.api.update_todolist_title(id, title),
            )
            .await
            .and_then(|envelope| Ok(envelope.check()?));
        self.settle(result, &[todolist_tag()]).await
    }

    /// One page of a todolist's tasks.
    pub async fn tasks(&self, todolist_id: Uuid, page: u32) -> Result<GetTasksResponse> {
        let args = GetTasksArgs::new(todolist_id, page);
        let api = self.api.clone();
        self.queries
            .query(Endpoint::GetTasks, &args, vec![task_tag(todolist_id)], move || async move {
                api.get_tasks(&args).await
            })
            .await
    }

    /// Keeps the todolists collection subscribed: while watched, every
    /// todolist mutation refetches it before returning.
    pub async fn watch_todolists(&self) -> Result<CacheKey> {
        let api = self.api.clone();
        self.queries
            .subscribe(Endpoint::GetTodolists, &(), vec![todolist_tag()], move || {
                let api = api.clone();
                async move {
                    let todolists = api.get_todolists().await;
                    todolists.map(|t| t.into_iter().map(DomainTodolist::from).collect::<Vec<_>>())
                }
            })
            .await
    }

    /// Keeps one page of tasks subscribed: while watched, every mutation of
    /// the todolist's tasks refetches it before returning.
    pub async fn watch_tasks(&self, todolist_id: Uuid, page: u32) -> Result<CacheKey> {
        let args = GetTasksArgs::new(todolist_id, page);
        let api = self.api.clone();
        self.queries
            .subscribe(Endpoint::GetTasks, &args, vec![task_tag(todolist_id)], move || {
                let api = api.clone();
                async move { api.get_tasks(&args).await }
            })
            .await
    }

    /// Ends one watch started by [`TodoApp::watch_todolists`] or
    /// [`TodoApp::watch_tasks`]. Returns the watchers left on that query.
    pub async fn unwatch(&self, key: &CacheKey) -> usize {
        self.queries.unsubscribe(key).await
    }

    pub async fn add_task(&self, todolist_id: Uuid, title: &str) -> Result<Task> {
        let result = self
            .queries
            .execute(Endpoint::AddTask, self.api.create_task(todolist_id, title))
            .await
            .and_then(|envelope| Ok(envelope.into_result()?.item));
        self.settle(result, &[task_tag(todolist_id)]).await
    }

    pub async fn remove_task(&self, todolist_id: Uuid, task_id: Uuid) -> Result<()> {
        let result = self
            .queries
            .execute(Endpoint::RemoveTask, self.api.delete_task(todolist_id, task_id))
            .await
            .and_then(|envelope| Ok(envelope.check()?));
        self.settle(result, &[task_tag(todolist_id)]).await
    }

    /// Updates a task optimistically.
    ///
    /// Every cached page of the todolist that holds the task shows `model`
    /// at once. On success the server's copy replaces it; on any failure the
    /// touched fields are restored. The todolist's task pages are
    /// invalidated either way.
    pub async fn update_task(
        &self,
        todolist_id: Uuid,
        task_id: Uuid,
        model: &UpdateTaskModel,
    ) -> Result<Task> {
        let cache = self.queries.cache();
        let patches = optimistic::patch_task_in_pages(cache, todolist_id, task_id, model).await?;

        let result = self
            .queries
            .execute(
                Endpoint::UpdateTask,
                self.api.update_task(todolist_id, task_id, model),
            )
            .await
            .and_then(|envelope| Ok(envelope.into_result()?.item));

        let result = match result {
            Ok(task) => optimistic::reconcile_task(cache, todolist_id, &task)
                .await
                .map(|_| task),
            Err(e) => {
                let restored = optimistic::rollback(cache, &patches).await;
                debug!(%task_id, restored, "task update failed, reverted");
                Err(e)
            }
        };
        self.settle(result, &[task_tag(todolist_id)]).await
    }

    /// Applies `changes` over the cached copy of a task.
    ///
    /// The backend replaces every field, so the task must be cached (its
    /// page listed) before it can be changed. Empty changes return the
    /// cached copy without a request.
    pub async fn change_task(
        &self,
        todolist_id: Uuid,
        task_id: Uuid,
        changes: &TaskChanges,
    ) -> Result<Task> {
        let task = optimistic::find_cached_task(self.queries.cache(), todolist_id, task_id)
            .await?
            .ok_or(ClientError::TaskNotCached { task_id })?;
        if changes.is_empty() {
            debug!(%task_id, "no task changes requested");
            return Ok(task);
        }
        self.update_task(todolist_id, task_id, &changes.to_model(&task))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use todosync_core::cache::QueryStatus;
    use todosync_core::envelope::ResultCode;
    use todosync_core::session::RequestStatus;
    use todosync_core::todolist::TaskStatus;

    use crate::inmemory::{InMemoryApi, Scripted, ISSUED_TOKEN};
    use crate::token::MemoryTokenStore;

    fn app_with(api: &InMemoryApi) -> (TodoApp, Arc<MemoryTokenStore>) {
        let tokens = Arc::new(MemoryTokenStore::new());
        let app = TodoApp::new(Arc::new(api.clone()), tokens.clone());
        (app, tokens)
    }

    fn credentials() -> LoginArgs {
        LoginArgs {
            email: "free@samuraijs.com".to_string(),
            password: "free".to_string(),
            remember_me: true,
            captcha: Some("x7k2".to_string()),
        }
    }

    async fn cached_page(app: &TodoApp, todolist_id: Uuid, page: u32) -> GetTasksResponse {
        let key = CacheKey::new(Endpoint::GetTasks, &GetTasksArgs::new(todolist_id, page)).unwrap();
        app.queries().cache().read().await.data(&key).unwrap().unwrap()
    }

    async fn wait_for_updates(api: &InMemoryApi, count: usize) {
        while InMemoryApi::count(&api.calls().update_task) < count {
            tokio::task::yield_now().await;
        }
    }

    // ==================== Session Tests ====================

    #[tokio::test]
    async fn test_login_success_persists_token() {
        let api = InMemoryApi::new();
        let (app, tokens) = app_with(&api);

        let outcome = app.login(credentials()).await.unwrap();

        assert_eq!(outcome, LoginOutcome::LoggedIn);
        assert_eq!(tokens.load().unwrap().as_deref(), Some(ISSUED_TOKEN));
        let session = app.session().await;
        assert!(session.is_logged_in);
        assert_eq!(session.captcha_url, None);
        assert!(app.me().await.is_ok());
    }

    #[tokio::test]
    async fn test_login_omits_captcha_without_active_captcha() {
        let api = InMemoryApi::new();
        let (app, _) = app_with(&api);

        app.login(credentials()).await.unwrap();

        assert_eq!(api.last_login().await.unwrap().captcha, None);
    }

    #[tokio::test]
    async fn test_login_captcha_error_fetches_captcha() {
        let api = InMemoryApi::new();
        api.set_captcha_url("https://example.com/captcha.png").await;
        api.script_login(Scripted::Domain(
            ResultCode::CaptchaError,
            "Incorrect anti-bot symbols".to_string(),
        ))
        .await;
        let (app, tokens) = app_with(&api);

        let outcome = app.login(credentials()).await.unwrap();

        assert_eq!(
            outcome,
            LoginOutcome::CaptchaRequired {
                captcha_url: Some("https://example.com/captcha.png".to_string()),
                message: "Please enter the captcha".to_string(),
            }
        );
        let session = app.session().await;
        assert!(!session.is_logged_in);
        assert_eq!(
            session.captcha_url.as_deref(),
            Some("https://example.com/captcha.png")
        );
        assert_eq!(tokens.load().unwrap(), None);

        // The answer goes out on the retry, and success clears the captcha.
        let outcome = app.login(credentials()).await.unwrap();
        assert_eq!(outcome, LoginOutcome::LoggedIn);
        assert_eq!(api.last_login().await.unwrap().captcha.as_deref(), Some("x7k2"));
        assert_eq!(app.session().await.captcha_url, None);
    }

    #[tokio::test]
    async fn test_resumed_captcha_sends_answer() {
        let api = InMemoryApi::new();
        let (app, _) = app_with(&api);

        app.resume_captcha("https://example.com/captcha.png".to_string())
            .await;
        app.login(credentials()).await.unwrap();

        assert_eq!(api.last_login().await.unwrap().captcha.as_deref(), Some("x7k2"));
    }

    #[tokio::test]
    async fn test_repeated_captcha_errors_refetch_each_time() {
        let api = InMemoryApi::new();
        let (app, _) = app_with(&api);
        for _ in 0..2 {
            api.script_login(Scripted::Domain(ResultCode::CaptchaError, String::new()))
                .await;
            app.login(credentials()).await.unwrap();
        }
        assert_eq!(InMemoryApi::count(&api.calls().captcha), 2);
    }

    #[tokio::test]
    async fn test_login_rejection_uses_first_message() {
        let api = InMemoryApi::new();
        api.script_login(Scripted::Domain(
            ResultCode::Error,
            "Incorrect Email or Password".to_string(),
        ))
        .await;
        let (app, _) = app_with(&api);

        let outcome = app.login(credentials()).await.unwrap();

        assert_eq!(
            outcome,
            LoginOutcome::Rejected {
                message: "Incorrect Email or Password".to_string()
            }
        );
        assert!(!app.session().await.is_logged_in);
    }

    #[tokio::test]
    async fn test_login_rejection_without_message_uses_default() {
        let api = InMemoryApi::new();
        api.script_login(Scripted::Domain(ResultCode::Error, String::new()))
            .await;
        let (app, _) = app_with(&api);

        let outcome = app.login(credentials()).await.unwrap();

        assert_eq!(
            outcome,
            LoginOutcome::Rejected {
                message: "Login failed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_login_transport_failure() {
        let api = InMemoryApi::new();
        api.script_login(Scripted::Transport).await;
        let (app, tokens) = app_with(&api);

        let outcome = app.login(credentials()).await.unwrap();

        assert_eq!(
            outcome,
            LoginOutcome::Rejected {
                message: "Network error occurred".to_string()
            }
        );
        assert_eq!(tokens.load().unwrap(), None);
        assert_eq!(app.session().await.status, RequestStatus::Failed);
    }

    #[tokio::test]
    async fn test_initialize_restores_session() {
        let api = InMemoryApi::new();
        let tokens = Arc::new(MemoryTokenStore::with_token(ISSUED_TOKEN));
        let app = TodoApp::new(Arc::new(api.clone()), tokens);

        assert!(app.initialize().await.unwrap());
        assert!(app.session().await.is_logged_in);
    }

    #[tokio::test]
    async fn test_initialize_with_stale_token_stays_logged_out() {
        let api = InMemoryApi::new();
        let tokens = Arc::new(MemoryTokenStore::with_token("expired"));
        let app = TodoApp::new(Arc::new(api.clone()), tokens);

        assert!(!app.initialize().await.unwrap());
        let session = app.session().await;
        assert!(!session.is_logged_in);
        assert_eq!(session.error, None);
    }

    #[tokio::test]
    async fn test_initialize_survives_unreachable_backend() {
        let api = InMemoryApi::new();
        api.set_me_offline(true);
        let tokens = Arc::new(MemoryTokenStore::with_token(ISSUED_TOKEN));
        let app = TodoApp::new(Arc::new(api.clone()), tokens);

        assert!(!app.initialize().await.unwrap());
        assert!(!app.session().await.is_logged_in);

        api.set_me_offline(false);
        assert_eq!(app.login(credentials()).await.unwrap(), LoginOutcome::LoggedIn);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let api = InMemoryApi::new();
        api.seed_todolist("Groceries").await;
        let (app, tokens) = app_with(&api);
        app.login(credentials()).await.unwrap();
        app.todolists().await.unwrap();

        app.logout().await.unwrap();

        assert_eq!(tokens.load().unwrap(), None);
        assert_eq!(app.session().await, SessionState::default());
        assert!(app.queries().cache().read().await.is_empty());
    }

    // ==================== Todolist Tests ====================

    #[tokio::test]
    async fn test_add_todolist_invalidates_collection() {
        let api = InMemoryApi::new();
        let (app, _) = app_with(&api);
        assert!(app.todolists().await.unwrap().is_empty());

        let created = app.add_todolist("Groceries").await.unwrap();
        let todolists = app.todolists().await.unwrap();

        assert_eq!(todolists.len(), 1);
        assert_eq!(todolists[0].id(), created.id);
        assert_eq!(InMemoryApi::count(&api.calls().get_todolists), 2);
    }

    #[tokio::test]
    async fn test_domain_error_is_surfaced() {
        let api = InMemoryApi::new();
        let (app, _) = app_with(&api);

        let result = app.add_todolist("  ").await;

        assert!(matches!(result, Err(ClientError::Domain(_))));
        let session = app.session().await;
        assert_eq!(session.error.as_deref(), Some("Title is required"));
        // Transport succeeded, so the request itself counts as fulfilled.
        assert_eq!(session.status, RequestStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_failed_todolist_delete_restores_entity_status() {
        let api = InMemoryApi::new();
        let ghost = api.seed_todolist("Ghost").await;
        let (app, _) = app_with(&api);
        app.todolists().await.unwrap();
        // Gone from the server, still cached locally.
        api.delete_todolist(ghost.id).await.unwrap();

        assert!(app.remove_todolist(ghost.id).await.is_err());

        let key = CacheKey::new(Endpoint::GetTodolists, &()).unwrap();
        let cached: Vec<DomainTodolist> = app.queries().cache().read().await.data(&key).unwrap().unwrap();
        assert_eq!(cached[0].entity_status, EntityStatus::Idle);
    }

    // ==================== Task Tests ====================

    #[tokio::test]
    async fn test_concurrent_task_pages_fetch_once() {
        let api = InMemoryApi::new();
        let list = api.seed_todolist("Groceries").await;
        api.seed_task(list.id, "Buy milk").await;
        api.set_tasks_delay(Duration::from_millis(20)).await;
        let (app, _) = app_with(&api);

        let (a, b) = tokio::join!(app.tasks(list.id, 1), app.tasks(list.id, 1));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(InMemoryApi::count(&api.calls().get_tasks), 1);
        assert_eq!(app.session().await.status, RequestStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_update_task_success_patches_every_page() {
        let api = InMemoryApi::new();
        let list = api.seed_todolist("Groceries").await;
        let first = api.seed_task(list.id, "Walk dog").await;
        for n in 0..3 {
            api.seed_task(list.id, &format!("chore {}", n)).await;
        }
        let target = api.seed_task(list.id, "Buy milk").await;
        let (app, _) = app_with(&api);

        // Page 2 is cached while the task is fifth; page 1 after it moved up.
        app.tasks(list.id, 2).await.unwrap();
        api.delete_task(list.id, first.id).await.unwrap();
        app.tasks(list.id, 1).await.unwrap();

        let gate = api.gate_update().await;
        let pending = tokio::spawn({
            let app = app.clone();
            async move {
                app.change_task(list.id, target.id, &TaskChanges::status(TaskStatus::Completed))
                    .await
            }
        });
        wait_for_updates(&api, 1).await;

        for page in [1, 2] {
            let cached = cached_page(&app, list.id, page).await;
            assert_eq!(cached.find(target.id).unwrap().status, TaskStatus::Completed);
        }

        gate.send(Scripted::Apply).unwrap();
        let updated = pending.await.unwrap().unwrap();

        assert_eq!(updated.status, TaskStatus::Completed);
        for page in [1, 2] {
            let cached = cached_page(&app, list.id, page).await;
            assert_eq!(cached.find(target.id).unwrap(), &updated);
        }

        let key = CacheKey::new(Endpoint::GetTasks, &GetTasksArgs::new(list.id, 1)).unwrap();
        let cache = app.queries().cache().read().await;
        assert!(cache.needs_fetch(&key));
        assert_eq!(cache.get(&key).unwrap().status, QueryStatus::Fulfilled);
    }

    #[tokio::test]
    async fn test_update_task_failure_restores_cache() {
        let api = InMemoryApi::new();
        let list = api.seed_todolist("Groceries").await;
        let target = api.seed_task(list.id, "Buy milk").await;
        let (app, _) = app_with(&api);
        let before = app.tasks(list.id, 1).await.unwrap();

        let gate = api.gate_update().await;
        gate.send(Scripted::Domain(ResultCode::Error, "Task is locked".to_string()))
            .unwrap();
        let changes = TaskChanges {
            title: Some("Buy bread".to_string()),
            status: Some(TaskStatus::InProgress),
            ..TaskChanges::default()
        };
        let result = app.change_task(list.id, target.id, &changes).await;

        assert!(matches!(result, Err(ClientError::Domain(_))));
        assert_eq!(cached_page(&app, list.id, 1).await, before);
        assert_eq!(app.session().await.error.as_deref(), Some("Task is locked"));
    }

    #[tokio::test]
    async fn test_update_task_transport_failure_restores_cache() {
        let api = InMemoryApi::new();
        let list = api.seed_todolist("Groceries").await;
        let target = api.seed_task(list.id, "Buy milk").await;
        let (app, _) = app_with(&api);
        let before = app.tasks(list.id, 1).await.unwrap();

        let gate = api.gate_update().await;
        gate.send(Scripted::Transport).unwrap();
        let result = app
            .change_task(list.id, target.id, &TaskChanges::status(TaskStatus::Completed))
            .await;

        assert!(result.unwrap_err().is_transport());
        assert_eq!(cached_page(&app, list.id, 1).await, before);
        assert_eq!(
            app.session().await.error.as_deref(),
            Some("Network error occurred")
        );
    }

    #[tokio::test]
    async fn test_update_task_without_cached_pages() {
        let api = InMemoryApi::new();
        let list = api.seed_todolist("Groceries").await;
        let target = api.seed_task(list.id, "Buy milk").await;
        let (app, _) = app_with(&api);

        let model = TaskChanges::status(TaskStatus::Completed).to_model(&target);
        let updated = app.update_task(list.id, target.id, &model).await.unwrap();

        assert_eq!(updated.status, TaskStatus::Completed);
        assert!(app.queries().cache().read().await.is_empty());
    }

    #[tokio::test]
    async fn test_change_task_requires_cached_task() {
        let api = InMemoryApi::new();
        let (app, _) = app_with(&api);
        let task_id = Uuid::new_v4();

        let result = app
            .change_task(Uuid::new_v4(), task_id, &TaskChanges::title("x"))
            .await;

        assert!(matches!(result, Err(ClientError::TaskNotCached { task_id: id }) if id == task_id));
    }

    #[tokio::test]
    async fn test_change_task_without_changes_skips_request() {
        let api = InMemoryApi::new();
        let list = api.seed_todolist("Groceries").await;
        let target = api.seed_task(list.id, "Buy milk").await;
        let (app, _) = app_with(&api);
        app.tasks(list.id, 1).await.unwrap();

        let task = app
            .change_task(list.id, target.id, &TaskChanges::default())
            .await
            .unwrap();

        assert_eq!((task.id, task.title), (target.id, target.title));
        assert_eq!(InMemoryApi::count(&api.calls().update_task), 0);
    }

    #[tokio::test]
    async fn test_watched_tasks_refetch_after_mutation() {
        let api = InMemoryApi::new();
        let list = api.seed_todolist("Groceries").await;
        api.seed_task(list.id, "Buy milk").await;
        let (app, _) = app_with(&api);

        let key = app.watch_tasks(list.id, 1).await.unwrap();
        app.tasks(list.id, 1).await.unwrap();
        assert_eq!(InMemoryApi::count(&api.calls().get_tasks), 1);

        app.add_task(list.id, "Walk dog").await.unwrap();
        assert_eq!(InMemoryApi::count(&api.calls().get_tasks), 2);
        assert!(!app.queries().cache().read().await.needs_fetch(&key));
        assert_eq!(cached_page(&app, list.id, 1).await.items.len(), 2);

        assert_eq!(app.unwatch(&key).await, 0);
        app.add_task(list.id, "Read").await.unwrap();
        assert_eq!(InMemoryApi::count(&api.calls().get_tasks), 2);
        assert!(app.queries().cache().read().await.needs_fetch(&key));
    }

    #[tokio::test]
    async fn test_watched_todolists_refetch_after_mutation() {
        let api = InMemoryApi::new();
        api.seed_todolist("Groceries").await;
        let (app, _) = app_with(&api);

        app.watch_todolists().await.unwrap();
        assert_eq!(app.todolists().await.unwrap().len(), 1);

        app.add_todolist("Chores").await.unwrap();
        assert_eq!(InMemoryApi::count(&api.calls().get_todolists), 2);
        assert_eq!(app.todolists().await.unwrap().len(), 2);
        assert_eq!(InMemoryApi::count(&api.calls().get_todolists), 2);
    }

    // ==================== Overlapping Update Tests ====================

    /// Starts a failing edit to `InProgress`, then a succeeding edit to
    /// `Completed`, on the same task. Returns the gates in that order.
    async fn overlapping_updates(
        app: &TodoApp,
        api: &InMemoryApi,
        list: Uuid,
        target: &Task,
    ) -> (
        (tokio::sync::oneshot::Sender<Scripted>, tokio::task::JoinHandle<Result<Task>>),
        (tokio::sync::oneshot::Sender<Scripted>, tokio::task::JoinHandle<Result<Task>>),
    ) {
        let failing_gate = api.gate_update().await;
        let succeeding_gate = api.gate_update().await;

        let failing = tokio::spawn({
            let app = app.clone();
            let model = TaskChanges::status(TaskStatus::InProgress).to_model(target);
            let task_id = target.id;
            async move { app.update_task(list, task_id, &model).await }
        });
        wait_for_updates(api, 1).await;

        let succeeding = tokio::spawn({
            let app = app.clone();
            let model = TaskChanges::status(TaskStatus::Completed).to_model(target);
            let task_id = target.id;
            async move { app.update_task(list, task_id, &model).await }
        });
        wait_for_updates(api, 2).await;

        ((failing_gate, failing), (succeeding_gate, succeeding))
    }

    #[tokio::test]
    async fn test_overlapping_updates_failure_settles_first() {
        let api = InMemoryApi::new();
        let list = api.seed_todolist("Groceries").await;
        let target = api.seed_task(list.id, "Buy milk").await;
        let (app, _) = app_with(&api);
        app.tasks(list.id, 1).await.unwrap();

        let ((fail_gate, failing), (ok_gate, succeeding)) =
            overlapping_updates(&app, &api, list.id, &target).await;

        fail_gate
            .send(Scripted::Domain(ResultCode::Error, "rejected".to_string()))
            .unwrap();
        assert!(failing.await.unwrap().is_err());
        ok_gate.send(Scripted::Apply).unwrap();
        assert!(succeeding.await.unwrap().is_ok());

        let page = cached_page(&app, list.id, 1).await;
        assert_eq!(page.find(target.id).unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_overlapping_updates_success_settles_first() {
        let api = InMemoryApi::new();
        let list = api.seed_todolist("Groceries").await;
        let target = api.seed_task(list.id, "Buy milk").await;
        let (app, _) = app_with(&api);
        app.tasks(list.id, 1).await.unwrap();

        let ((fail_gate, failing), (ok_gate, succeeding)) =
            overlapping_updates(&app, &api, list.id, &target).await;

        ok_gate.send(Scripted::Apply).unwrap();
        assert!(succeeding.await.unwrap().is_ok());
        fail_gate
            .send(Scripted::Domain(ResultCode::Error, "rejected".to_string()))
            .unwrap();
        assert!(failing.await.unwrap().is_err());

        // The late revert writes back the value it replaced: last write wins.
        let page = cached_page(&app, list.id, 1).await;
        assert_eq!(page.find(target.id).unwrap().status, TaskStatus::New);
        assert_eq!(
            api.server_task(list.id, target.id).await.unwrap().status,
            TaskStatus::Completed
        );
    }
}
