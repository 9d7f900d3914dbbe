//! Todolist CLI commands.

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Todolist management commands.
#[derive(Debug, Parser)]
pub struct TodolistsCommand {
    #[command(subcommand)]
    pub action: TodolistsAction,
}

/// Available todolist actions.
#[derive(Debug, Subcommand)]
pub enum TodolistsAction {
    /// List all todolists.
    List,
    /// Create a todolist.
    Create {
        /// Todolist title.
        title: String,
    },
    /// Rename a todolist.
    Rename {
        /// Todolist ID.
        id: Uuid,
        /// New title.
        title: String,
    },
    /// Delete a todolist and its tasks.
    Delete {
        /// Todolist ID.
        id: Uuid,
    },
}
