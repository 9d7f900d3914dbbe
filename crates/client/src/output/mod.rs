//! Output formatting functions.

pub mod pretty;

use serde::Serialize;

use crate::cli::OutputFormat;

/// Renders `value` as compact JSON, or through `pretty` for humans.
pub fn render<T, F>(value: &T, format: OutputFormat, pretty: F) -> serde_json::Result<String>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Json => serde_json::to_string(value),
        OutputFormat::Pretty => Ok(pretty(value)),
    }
}
