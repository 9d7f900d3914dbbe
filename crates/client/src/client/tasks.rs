//! Task API operations.

use reqwest::Method;
use todosync_core::envelope::ResponseEnvelope;
use todosync_core::todolist::{
    EmptyData, GetTasksArgs, GetTasksResponse, ItemData, Task, TitleRequest, UpdateTaskModel,
};
use uuid::Uuid;

use super::TodoClient;
use crate::error::Result;

impl TodoClient {
    /// Fetch one page of a todolist's tasks.
    pub async fn get_tasks(&self, args: &GetTasksArgs) -> Result<GetTasksResponse> {
        let response = self
            .request(Method::GET, &format!("todo-lists/{}/tasks", args.todolist_id))
            .await
            .query(&args.query())
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Create a task in a todolist.
    pub async fn create_task(
        &self,
        todolist_id: Uuid,
        title: &str,
    ) -> Result<ResponseEnvelope<ItemData<Task>>> {
        let response = self
            .request(Method::POST, &format!("todo-lists/{}/tasks", todolist_id))
            .await
            .json(&TitleRequest::new(title))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Delete a task.
    pub async fn delete_task(
        &self,
        todolist_id: Uuid,
        task_id: Uuid,
    ) -> Result<ResponseEnvelope<EmptyData>> {
        let response = self
            .request(
                Method::DELETE,
                &format!("todo-lists/{}/tasks/{}", todolist_id, task_id),
            )
            .await
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Replace a task's mutable fields.
    pub async fn update_task(
        &self,
        todolist_id: Uuid,
        task_id: Uuid,
        model: &UpdateTaskModel,
    ) -> Result<ResponseEnvelope<ItemData<Task>>> {
        let response = self
            .request(
                Method::PUT,
                &format!("todo-lists/{}/tasks/{}", todolist_id, task_id),
            )
            .await
            .json(model)
            .send()
            .await?;
        self.handle_response(response).await
    }
}
