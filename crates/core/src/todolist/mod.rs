mod requests;
mod types;

pub use requests::{
    GetTasksArgs, LoginArgs, PageParams, TaskChanges, TasksQuery, TitleRequest, UpdateTaskModel,
    PAGE_SIZE,
};
pub use types::{
    CaptchaResponse, DomainTodolist, EmptyData, EntityStatus, GetTasksResponse, ItemData,
    LoginData, MeData, Task, TaskPriority, TaskStatus, Todolist,
};
