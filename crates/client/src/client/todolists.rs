//! Todolist API operations.

use reqwest::Method;
use todosync_core::envelope::ResponseEnvelope;
use todosync_core::todolist::{EmptyData, ItemData, TitleRequest, Todolist};
use uuid::Uuid;

use super::TodoClient;
use crate::error::Result;

impl TodoClient {
    /// List all todolists.
    pub async fn get_todolists(&self) -> Result<Vec<Todolist>> {
        let response = self.request(Method::GET, "todo-lists").await.send().await?;
        self.handle_response(response).await
    }

    /// Create a new todolist.
    pub async fn create_todolist(&self, title: &str) -> Result<ResponseEnvelope<ItemData<Todolist>>> {
        let response = self
            .request(Method::POST, "todo-lists")
            .await
            .json(&TitleRequest::new(title))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Delete todolist by ID.
    pub async fn delete_todolist(&self, id: Uuid) -> Result<ResponseEnvelope<EmptyData>> {
        let response = self
            .request(Method::DELETE, &format!("todo-lists/{}", id))
            .await
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Rename a todolist.
    pub async fn update_todolist_title(
        &self,
        id: Uuid,
        title: &str,
    ) -> Result<ResponseEnvelope<EmptyData>> {
        let response = self
            .request(Method::PUT, &format!("todo-lists/{}", id))
            .await
            .json(&TitleRequest::new(title))
            .send()
            .await?;
        self.handle_response(response).await
    }
}
