//! JSON-file stores under the config directory.
//!
//! Each store loads once at construction and writes through on every change.

pub mod api_keys;
pub mod settings;
pub mod templates;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{WorkerError, WorkerResult};

pub use api_keys::{ApiKey, ApiKeyStore};
pub use settings::SettingsStore;
pub use templates::TemplateStore;

/// Read `path`, or `None` when it is missing. A file that exists but does
/// not parse is a configuration error.
fn load_json<T: DeserializeOwned>(path: &Path) -> WorkerResult<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content).map(Some).map_err(|e| {
        WorkerError::config_error(format!("Invalid {}: {}", path.display(), e))
    })
}

/// Read `path`, or `None` when it is missing or unparsable.
///
/// A corrupt file is logged and treated as absent so the store can reseed.
fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match load_json(path) {
        Ok(value) => value,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Ignoring unreadable store file");
            None
        }
    }
}

/// Pretty-print `value` to `path` through a temporary sibling file.
fn write_json<T: Serialize>(path: &Path, value: &T) -> WorkerResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
