//! Persisted auth token.
//!
//! The token lives in a small JSON store file so that a later run can
//! restore the session without logging in again.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::Result;

/// Store filename for auth data.
pub const AUTH_STORE: &str = "auth.json";

/// Key used to store the auth token in the auth store.
pub const AUTH_TOKEN_KEY: &str = "sn-token";

/// Persistent storage for the auth token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Token store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_store(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_store(&self, store: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(store)?)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        let store = self.read_store()?;
        Ok(store
            .get(AUTH_TOKEN_KEY)
            .and_then(Value::as_str)
            .map(String::from))
    }

    fn save(&self, token: &str) -> Result<()> {
        let mut store = self.read_store()?;
        store.insert(AUTH_TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.write_store(&store)?;
        info!(path = %self.path.display(), "Auth token saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut store = self.read_store()?;
        if store.remove(AUTH_TOKEN_KEY).is_some() {
            self.write_store(&store)?;
            debug!(path = %self.path.display(), "Auth token cleared");
        }
        Ok(())
    }
}

/// Token store kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.token.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
