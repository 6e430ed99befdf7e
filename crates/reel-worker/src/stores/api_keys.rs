//! API key store: `api_keys/api_keys.json` plus the selected key in
//! `api_keys/key_settings.json`.
//!
//! Keys are base64-encoded on disk. That keeps them out of casual view; it
//! is not encryption.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{read_json, write_json};
use crate::error::{WorkerError, WorkerResult};

/// Id of the key seeded from the environment.
pub const DEFAULT_KEY_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct KeySettings {
    #[serde(default)]
    last_used_key: Option<String>,
}

#[derive(Debug)]
pub struct ApiKeyStore {
    keys_file: PathBuf,
    settings_file: PathBuf,
    keys: BTreeMap<String, ApiKey>,
    settings: KeySettings,
}

fn obscure(key: &str) -> String {
    STANDARD.encode(key.as_bytes())
}

/// Decode a stored key. Values that are not valid base64 text are taken
/// as plain keys written by hand.
fn reveal(stored: &str) -> String {
    STANDARD
        .decode(stored.as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| stored.to_string())
}

impl ApiKeyStore {
    /// Load the store. When no key file exists and `env_key` is set, it is
    /// saved as the `default` key and selected.
    pub fn open(config_dir: &Path, env_key: Option<&str>) -> WorkerResult<Self> {
        let dir = config_dir.join("api_keys");
        let keys_file = dir.join("api_keys.json");
        let settings_file = dir.join("key_settings.json");

        let file_existed = keys_file.exists();
        let keys: BTreeMap<String, ApiKey> = read_json::<BTreeMap<String, ApiKey>>(&keys_file)
            .unwrap_or_default()
            .into_iter()
            .map(|(id, mut key)| {
                key.key = reveal(&key.key);
                (id, key)
            })
            .collect();

        let mut store = Self {
            keys,
            settings: read_json(&settings_file).unwrap_or_default(),
            keys_file,
            settings_file,
        };

        if !file_existed {
            if let Some(env_key) = env_key.filter(|k| !k.trim().is_empty()) {
                store.keys.insert(
                    DEFAULT_KEY_ID.to_string(),
                    ApiKey {
                        name: "Default (.env)".to_string(),
                        key: env_key.to_string(),
                        description: "API key from environment".to_string(),
                        created_date: Local::now().format("%Y-%m-%d %H:%M").to_string(),
                    },
                );
                store.save_keys()?;
                store.set_current(DEFAULT_KEY_ID)?;
                info!("Seeded API key store from environment");
            }
        }

        Ok(store)
    }

    fn save_keys(&self) -> WorkerResult<()> {
        let on_disk: BTreeMap<&String, ApiKey> = self
            .keys
            .iter()
            .map(|(id, key)| {
                let mut key = key.clone();
                key.key = obscure(&key.key);
                (id, key)
            })
            .collect();
        write_json(&self.keys_file, &on_disk)
    }

    fn save_settings(&self) -> WorkerResult<()> {
        write_json(&self.settings_file, &self.settings)
    }

    pub fn ids(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&ApiKey> {
        self.keys.get(id)
    }

    /// Add or replace a key.
    pub fn add(&mut self, id: &str, name: &str, key: &str, description: &str) -> WorkerResult<()> {
        if key.trim().is_empty() {
            return Err(WorkerError::store("API key cannot be empty"));
        }
        self.keys.insert(
            id.to_string(),
            ApiKey {
                name: name.to_string(),
                key: key.trim().to_string(),
                description: description.to_string(),
                created_date: Local::now().format("%Y-%m-%d %H:%M").to_string(),
            },
        );
        self.save_keys()
    }

    /// Change an existing key's name, value or description, keeping its creation date.
    pub fn update(&mut self, id: &str, name: &str, key: &str, description: &str) -> WorkerResult<()> {
        let Some(existing) = self.keys.get_mut(id) else {
            return Err(WorkerError::store(format!("API key '{}' not found", id)));
        };
        existing.name = name.to_string();
        existing.key = key.trim().to_string();
        existing.description = description.to_string();
        self.save_keys()
    }

    /// Remove a key. Removing the selected key selects another one, if any.
    pub fn delete(&mut self, id: &str) -> WorkerResult<()> {
        if self.keys.remove(id).is_none() {
            return Err(WorkerError::store(format!("API key '{}' not found", id)));
        }
        self.save_keys()?;

        if self.settings.last_used_key.as_deref() == Some(id) {
            self.settings.last_used_key = self.keys.keys().next().cloned();
            debug!(selected = ?self.settings.last_used_key, "Re-selected API key after delete");
            self.save_settings()?;
        }
        Ok(())
    }

    pub fn set_current(&mut self, id: &str) -> WorkerResult<()> {
        if !self.keys.contains_key(id) {
            return Err(WorkerError::store(format!("API key '{}' not found", id)));
        }
        self.settings.last_used_key = Some(id.to_string());
        self.save_settings()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.settings
            .last_used_key
            .as_deref()
            .filter(|id| self.keys.contains_key(*id))
    }

    /// The selected key's value.
    pub fn current_key(&self) -> Option<&str> {
        self.current_id()
            .and_then(|id| self.keys.get(id))
            .map(|k| k.key.as_str())
    }
}
