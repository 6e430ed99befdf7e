//! `batch_settings.json`.

use std::path::{Path, PathBuf};

use tracing::info;

use super::{load_json, write_json};
use crate::error::WorkerResult;
use reel_models::BatchSettings;

pub const SETTINGS_FILE: &str = "batch_settings.json";

/// Persisted batch settings.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    settings: BatchSettings,
}

impl SettingsStore {
    /// Load from `<config_dir>/batch_settings.json`; missing keys take defaults.
    ///
    /// A file that does not parse (wrong types, negative limit) is an error
    /// rather than a silent reset to defaults.
    pub fn open(config_dir: &Path) -> WorkerResult<Self> {
        let path = config_dir.join(SETTINGS_FILE);
        let settings = load_json(&path)?.unwrap_or_default();
        Ok(Self { path, settings })
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Validate, replace and persist.
    pub fn save(&mut self, settings: BatchSettings) -> WorkerResult<()> {
        settings.validate()?;
        write_json(&self.path, &settings)?;
        self.settings = settings;
        info!(file = %self.path.display(), "Batch settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();
        assert_eq!(store.settings(), &BatchSettings::default());
    }

    #[test]
    fn test_partial_file_merges_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"USE_CUSTOM_DATE": false, "DAY_LIMIT": 5}"#,
        )
        .unwrap();

        let store = SettingsStore::open(dir.path()).unwrap();
        assert!(!store.settings().use_custom_prefix);
        assert_eq!(store.settings().daily_limit, 5);
        assert!(store.settings().auto_crop);
    }

    #[test]
    fn test_unparsable_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        for content in [
            r#"{"USE_CUSTOM_DATE": false, "DAY_LIMIT": -1, "AUTO_CONTINUE_ON_ERROR": false}"#,
            r#"{"DAY_LIMIT": "ten"}"#,
        ] {
            std::fs::write(dir.path().join(SETTINGS_FILE), content).unwrap();
            let err = SettingsStore::open(dir.path()).unwrap_err();
            assert!(matches!(err, WorkerError::ConfigError(_)));
            assert!(err.is_batch_fatal());
        }
    }

    #[test]
    fn test_save_round_trips_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::open(dir.path()).unwrap();

        let mut settings = BatchSettings::default();
        settings.custom_prefix = "12".into();
        settings.add_logo = false;
        store.save(settings.clone()).unwrap();
        assert_eq!(SettingsStore::open(dir.path()).unwrap().settings(), &settings);

        settings.daily_limit = 0;
        assert!(matches!(store.save(settings), Err(WorkerError::InvalidSettings(_))));
        assert_eq!(store.settings().daily_limit, 50);
    }
}
