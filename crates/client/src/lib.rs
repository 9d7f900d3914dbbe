//! todosync_client - async todolist client and CLI.
//!
//! Queries are cached by endpoint and arguments, task updates are applied
//! optimistically and rolled back on failure, and every request reports its
//! lifecycle to a shared session state.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod inmemory;
pub mod optimistic;
pub mod output;
pub mod query;
pub mod token;

pub use app::{LoginOutcome, TodoApp};
pub use client::{RemoteApi, TodoClient};
pub use config::Config;
pub use error::{ClientError, Result};
pub use query::QueryClient;
