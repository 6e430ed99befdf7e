//! Worker error types.

use thiserror::Error;

use reel_media::MediaError;
use reel_models::{SettingsError, TransitionError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("A batch is already running")]
    BatchAlreadyRunning,

    #[error("Invalid batch settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error("Daily limit of {limit} reached for prefix '{prefix}'")]
    QuotaExhausted { prefix: String, limit: u32 },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Text generation failed: {0}")]
    GenerationFailed(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Stopped before {0}")]
    Stopped(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Invalid item transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    pub fn render_failed(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Errors that end the batch before any item is processed.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::BatchAlreadyRunning
                | WorkerError::InvalidSettings(_)
                | WorkerError::QuotaExhausted { .. }
                | WorkerError::ConfigError(_)
        )
    }

    /// Check if error is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            WorkerError::GenerationFailed(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("429") || msg.contains("rate limit") || msg.contains("status 5")
            }
            WorkerError::Media(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_fatal_classification() {
        assert!(WorkerError::BatchAlreadyRunning.is_batch_fatal());
        assert!(WorkerError::InvalidSettings(SettingsError::ZeroDailyLimit).is_batch_fatal());
        assert!(WorkerError::QuotaExhausted {
            prefix: "5".into(),
            limit: 3
        }
        .is_batch_fatal());

        assert!(!WorkerError::download_failed("private account").is_batch_fatal());
        assert!(!WorkerError::Stopped("render").is_batch_fatal());
    }

    #[test]
    fn test_retryable_generation_errors() {
        assert!(WorkerError::generation_failed("API returned status 503").is_retryable());
        assert!(WorkerError::generation_failed("429 Too Many Requests").is_retryable());
        assert!(!WorkerError::generation_failed("API returned status 401").is_retryable());
        assert!(!WorkerError::render_failed("ffmpeg exited").is_retryable());
    }

    #[test]
    fn test_stopped_message_names_stage() {
        assert_eq!(WorkerError::Stopped("render").to_string(), "Stopped before render");
    }
}
