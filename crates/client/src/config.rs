use std::{path::PathBuf, time::Duration};

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "https://social-network.samuraijs.com/api/1.1/";

pub const DEFAULT_DATA_DIR: &str = ".todosync";

pub const DEFAULT_TIMEOUT_SECONDS: &str = "30";

/// Client configuration. The CLI fills it from flags or `TODOSYNC_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend base URL (default: the public todolist API)
    pub base_url: String,
    /// Value of the `API-KEY` header, if the backend requires one
    pub api_key: Option<String>,
    /// Directory holding the persisted auth token (default: ".todosync")
    pub data_dir: PathBuf,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
}

impl Config {
    /// Get the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Path of the JSON file holding the auth token.
    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join(crate::token::AUTH_STORE)
    }
}
