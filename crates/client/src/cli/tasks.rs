//! Task CLI commands.

use clap::{Parser, Subcommand, ValueEnum};
use todosync_core::todolist::TaskStatus;
use uuid::Uuid;

/// Task management commands.
#[derive(Debug, Parser)]
pub struct TasksCommand {
    #[command(subcommand)]
    pub action: TasksAction,
}

/// CLI task status (with clap ValueEnum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    New,
    InProgress,
    Completed,
    Draft,
}

impl From<StatusArg> for TaskStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::New => TaskStatus::New,
            StatusArg::InProgress => TaskStatus::InProgress,
            StatusArg::Completed => TaskStatus::Completed,
            StatusArg::Draft => TaskStatus::Draft,
        }
    }
}

/// Available task actions.
#[derive(Debug, Subcommand)]
pub enum TasksAction {
    /// List one page of a todolist's tasks.
    List {
        /// Todolist ID.
        todolist_id: Uuid,
        /// Page number, starting at 1.
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// Add a task to a todolist.
    Add {
        /// Todolist ID.
        todolist_id: Uuid,
        /// Task title.
        title: String,
    },
    /// Remove a task.
    Remove {
        /// Todolist ID.
        todolist_id: Uuid,
        /// Task ID.
        task_id: Uuid,
    },
    /// Rename a task.
    Rename {
        /// Todolist ID.
        todolist_id: Uuid,
        /// Task ID.
        task_id: Uuid,
        /// New title.
        title: String,
    },
    /// Move a task to another status.
    Status {
        /// Todolist ID.
        todolist_id: Uuid,
        /// Task ID.
        task_id: Uuid,
        /// New status.
        #[arg(value_enum)]
        status: StatusArg,
    },
}
