//! Serde helpers for the backend's loose JSON.
//!
//! The todolist backend sends `null` for text fields it considers empty and
//! omits nothing, so these helpers fold `null` into sensible Rust values.

use serde::{Deserialize, Deserializer};

/// Deserialize an optional string, treating `null` and blank strings as None.
pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.trim().is_empty()))
}

/// Deserialize a message list, treating `null` as no messages.
pub fn deserialize_null_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let v: Option<Vec<T>> = Option::deserialize(deserializer)?;
    Ok(v.unwrap_or_default())
}
