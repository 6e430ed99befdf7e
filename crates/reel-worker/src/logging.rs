//! Structured item logging and subscriber setup.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: colored text by default, JSON when
/// `LOG_FORMAT=json`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reel_worker=info,reel_media=info,reel_batch=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logger for one batch item.
///
/// Every event carries the item's position, URL and current stage.
#[derive(Debug, Clone)]
pub struct ItemLogger {
    index: usize,
    total: usize,
    url: String,
    stage: &'static str,
}

impl ItemLogger {
    pub fn new(index: usize, total: usize, url: &str) -> Self {
        Self {
            index,
            total,
            url: url.to_string(),
            stage: "pending",
        }
    }

    /// Switch the stage reported with subsequent events.
    pub fn stage(&mut self, stage: &'static str) {
        self.stage = stage;
        info!(
            index = self.index,
            total = self.total,
            url = %self.url,
            stage = self.stage,
            "Item stage started"
        );
    }

    pub fn log_start(&self) {
        info!(
            index = self.index,
            total = self.total,
            url = %self.url,
            "Processing item {} of {}", self.index, self.total
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            index = self.index,
            url = %self.url,
            stage = self.stage,
            "Item warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            index = self.index,
            url = %self.url,
            stage = self.stage,
            "Item failed: {}", message
        );
    }

    pub fn log_completion(&self, output: &str, total_secs: f64) {
        info!(
            index = self.index,
            url = %self.url,
            output = %output,
            total_secs,
            "Item completed"
        );
    }

    pub fn current_stage(&self) -> &'static str {
        self.stage
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!("item", index = self.index, url = %self.url)
    }
}
