//! HTTP client for the todolist API.

pub mod auth;
pub mod tasks;
pub mod todolists;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tokio::sync::RwLock;
use todosync_core::envelope::ResponseEnvelope;
use todosync_core::todolist::{
    CaptchaResponse, EmptyData, GetTasksArgs, GetTasksResponse, ItemData, LoginArgs, LoginData,
    MeData, Task, Todolist, UpdateTaskModel,
};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ClientError, Result};

/// Header carrying the backend API key.
const API_KEY_HEADER: &str = "API-KEY";

/// The backend operations the rest of the client depends on.
///
/// [`TodoClient`] talks HTTP; tests substitute an in-memory fake.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Replaces the bearer token attached to later requests.
    async fn set_token(&self, token: Option<String>);

    async fn me(&self) -> Result<ResponseEnvelope<MeData>>;
    async fn captcha_url(&self) -> Result<CaptchaResponse>;
    async fn login(&self, args: &LoginArgs) -> Result<ResponseEnvelope<LoginData>>;
    async fn logout(&self) -> Result<ResponseEnvelope<EmptyData>>;

    async fn get_todolists(&self) -> Result<Vec<Todolist>>;
    async fn create_todolist(&self, title: &str) -> Result<ResponseEnvelope<ItemData<Todolist>>>;
    async fn delete_todolist(&self, id: Uuid) -> Result<ResponseEnvelope<EmptyData>>;
    async fn update_todolist_title(
        &self,
        id: Uuid,
        title: &str,
    ) -> Result<ResponseEnvelope<EmptyData>>;

    async fn get_tasks(&self, args: &GetTasksArgs) -> Result<GetTasksResponse>;
    async fn create_task(
        &self,
        todolist_id: Uuid,
        title: &str,
    ) -> Result<ResponseEnvelope<ItemData<Task>>>;
    async fn delete_task(&self, todolist_id: Uuid, task_id: Uuid)
        -> Result<ResponseEnvelope<EmptyData>>;
    async fn update_task(
        &self,
        todolist_id: Uuid,
        task_id: Uuid,
        model: &UpdateTaskModel,
    ) -> Result<ResponseEnvelope<ItemData<Task>>>;
}

/// HTTP client for the todolist API.
#[derive(Debug, Clone)]
pub struct TodoClient {
    client: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl TodoClient {
    /// Create a new client with the given base URL and default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a client from configuration: timeout and API key header.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let value = HeaderValue::from_str(api_key)
                .map_err(|e| ClientError::InvalidInput(format!("API key: {}", e)))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a URL for an endpoint.
    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Start a request with the bearer token attached, if any.
    async fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.token.read().await.as_deref() {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Handle error responses.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(ClientError::from)
        } else if status.as_u16() == 404 {
            Err(ClientError::NotFound {
                resource: response.url().path().to_string(),
            })
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(ClientError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Joins a base URL and a relative path with exactly one slash.
fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[async_trait]
impl RemoteApi for TodoClient {
    async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    async fn me(&self) -> Result<ResponseEnvelope<MeData>> {
        TodoClient::me(self).await
    }

    async fn captcha_url(&self) -> Result<CaptchaResponse> {
        TodoClient::captcha_url(self).await
    }

    async fn login(&self, args: &LoginArgs) -> Result<ResponseEnvelope<LoginData>> {
        TodoClient::login(self, args).await
    }

    async fn logout(&self) -> Result<ResponseEnvelope<EmptyData>> {
        TodoClient::logout(self).await
    }

    async fn get_todolists(&self) -> Result<Vec<Todolist>> {
        TodoClient::get_todolists(self).await
    }

    async fn create_todolist(&self, title: &str) -> Result<ResponseEnvelope<ItemData<Todolist>>> {
        TodoClient::create_todolist(self, title).await
    }

    async fn delete_todolist(&self, id: Uuid) -> Result<ResponseEnvelope<EmptyData>> {
        TodoClient::delete_todolist(self, id).await
    }

    async fn update_todolist_title(
        &self,
        id: Uuid,
        title: &str,
    ) -> Result<ResponseEnvelope<EmptyData>> {
        TodoClient::update_todolist_title(self, id, title).await
    }

    async fn get_tasks(&self, args: &GetTasksArgs) -> Result<GetTasksResponse> {
        TodoClient::get_tasks(self, args).await
    }

    async fn create_task(
        &self,
        todolist_id: Uuid,
        title: &str,
    ) -> Result<ResponseEnvelope<ItemData<Task>>> {
        TodoClient::create_task(self, todolist_id, title).await
    }

    async fn delete_task(
        &self,
        todolist_id: Uuid,
        task_id: Uuid,
    ) -> Result<ResponseEnvelope<EmptyData>> {
        TodoClient::delete_task(self, todolist_id, task_id).await
    }

    async fn update_task(
        &self,
        todolist_id: Uuid,
        task_id: Uuid,
        model: &UpdateTaskModel,
    ) -> Result<ResponseEnvelope<ItemData<Task>>> {
        TodoClient::update_task(self, todolist_id, task_id, model).await
    }
}
