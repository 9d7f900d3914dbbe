//! CLI command definitions.

pub mod auth;
pub mod tasks;
pub mod todolists;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{Config, DEFAULT_BASE_URL, DEFAULT_DATA_DIR, DEFAULT_TIMEOUT_SECONDS};

/// CLI client for the todolist API.
#[derive(Debug, Parser)]
#[command(name = "todosync")]
#[command(version, about = "CLI client for the todolist API", long_about = None)]
pub struct Cli {
    /// Server base URL.
    #[arg(long, env = "TODOSYNC_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Value of the API-KEY header.
    #[arg(long, env = "TODOSYNC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory holding the stored auth token.
    #[arg(long, env = "TODOSYNC_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Request timeout in seconds.
    #[arg(long, env = "TODOSYNC_TIMEOUT_SECONDS", default_value = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout: u64,

    /// Output format.
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,

    /// Suppress non-essential output.
    #[arg(long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Client configuration from the parsed arguments.
    pub fn config(&self) -> Config {
        Config {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone().filter(|key| !key.trim().is_empty()),
            data_dir: self.data_dir.clone(),
            timeout_seconds: self.timeout,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Raw JSON output.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and store the auth token.
    Login(auth::LoginCommand),
    /// Log out and forget the stored token.
    Logout,
    /// Show the logged-in user.
    Me,
    /// Todolist management.
    Todolists(todolists::TodolistsCommand),
    /// Task management.
    Tasks(tasks::TasksCommand),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_status() {
        let cli = Cli::try_parse_from([
            "todosync",
            "--format",
            "json",
            "tasks",
            "status",
            "6f1a3c1e-7d52-4c53-9b7d-0a3e0d7b2c11",
            "0b8d1c1e-7d52-4c53-9b7d-0a3e0d7b2c22",
            "completed",
        ])
        .unwrap();

        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Commands::Tasks(tasks::TasksCommand {
                action: tasks::TasksAction::Status { status, .. },
            }) => assert_eq!(status, tasks::StatusArg::Completed),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_from_args() {
        let cli = Cli::try_parse_from([
            "todosync",
            "--base-url",
            "http://localhost:3000",
            "--api-key",
            " ",
            "--timeout",
            "5",
            "me",
        ])
        .unwrap();

        let config = cli.config();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.api_key, None);
        assert_eq!(config.timeout_seconds, 5);
    }
}
