//! Persisted batch settings.
//!
//! Field names on disk keep the upper-case keys of `batch_settings.json`.
//! Missing keys fall back to defaults.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters that cannot appear in an output file prefix.
pub const INVALID_PREFIX_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Default files-per-day ceiling.
pub const DEFAULT_DAILY_LIMIT: u32 = 50;

/// Rejected batch settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("File prefix cannot be empty")]
    EmptyPrefix,

    #[error("File prefix contains invalid characters: {0}")]
    InvalidPrefix(String),

    #[error("Daily limit must be greater than 0")]
    ZeroDailyLimit,
}

/// User-facing batch options saved between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BatchSettings {
    /// Use `custom_prefix` instead of today's day-of-month
    #[serde(rename = "USE_CUSTOM_DATE")]
    pub use_custom_prefix: bool,
    #[serde(rename = "CUSTOM_DATE_STR")]
    pub custom_prefix: String,
    #[serde(rename = "DAY_LIMIT")]
    pub daily_limit: u32,
    #[serde(rename = "AUTO_CONTINUE_ON_ERROR")]
    pub continue_on_error: bool,
    #[serde(rename = "SAVE_FAILED_URLS")]
    pub save_failed_report: bool,
    #[serde(rename = "AUTO_CROP")]
    pub auto_crop: bool,
    #[serde(rename = "ADD_BRANDING")]
    pub add_branding: bool,
    #[serde(rename = "ADD_LOGO")]
    pub add_logo: bool,
    #[serde(rename = "GENERATE_TITLE")]
    pub generate_title: bool,
    /// Prompt template id; `None` uses the store's current template
    #[serde(rename = "TEMPLATE_ID", skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            use_custom_prefix: true,
            custom_prefix: "24".to_string(),
            daily_limit: DEFAULT_DAILY_LIMIT,
            continue_on_error: true,
            save_failed_report: true,
            auto_crop: true,
            add_branding: true,
            add_logo: true,
            generate_title: true,
            template_id: None,
        }
    }
}

impl BatchSettings {
    /// Check the options that make a batch impossible to start.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.daily_limit == 0 {
            return Err(SettingsError::ZeroDailyLimit);
        }
        if self.use_custom_prefix {
            validate_prefix(&self.custom_prefix)?;
        }
        Ok(())
    }
}

/// Validate an output file prefix.
pub fn validate_prefix(prefix: &str) -> Result<(), SettingsError> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(SettingsError::EmptyPrefix);
    }
    if prefix.contains(INVALID_PREFIX_CHARS) {
        return Err(SettingsError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let settings: BatchSettings =
            serde_json::from_str(r#"{"CUSTOM_DATE_STR": "7", "DAY_LIMIT": 3}"#).unwrap();

        assert_eq!(settings.custom_prefix, "7");
        assert_eq!(settings.daily_limit, 3);
        assert!(settings.use_custom_prefix);
        assert!(settings.continue_on_error);
        assert!(settings.template_id.is_none());
    }

    #[test]
    fn test_validation_rejects_bad_prefix_and_zero_limit() {
        let mut settings = BatchSettings::default();
        assert!(settings.validate().is_ok());

        settings.custom_prefix = "24/7".into();
        assert!(matches!(settings.validate(), Err(SettingsError::InvalidPrefix(_))));

        settings.custom_prefix = "  ".into();
        assert_eq!(settings.validate(), Err(SettingsError::EmptyPrefix));

        // Prefix is irrelevant when the day-of-month is used
        settings.use_custom_prefix = false;
        assert!(settings.validate().is_ok());

        settings.daily_limit = 0;
        assert_eq!(settings.validate(), Err(SettingsError::ZeroDailyLimit));
    }
}
