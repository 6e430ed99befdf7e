//! Batch progress accounting and the failed-URL report.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::WorkerResult;
use reel_models::{BatchSummary, FailedItem};

/// Accumulates per-item outcomes for one batch.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    /// URLs submitted before quota truncation
    input_total: usize,
    /// URLs the batch intends to process
    planned: usize,
    current_index: usize,
    current_url: Option<String>,
    successful: usize,
    failed: Vec<FailedItem>,
}

impl ProgressTracker {
    pub fn new(planned: usize, input_total: usize) -> Self {
        Self {
            input_total: input_total.max(planned),
            planned,
            current_index: 0,
            current_url: None,
            successful: 0,
            failed: Vec::new(),
        }
    }

    /// Begin the next item and return its 1-based index.
    pub fn start_next(&mut self, url: &str) -> usize {
        self.current_index += 1;
        self.current_url = Some(url.to_string());
        self.current_index
    }

    pub fn mark_success(&mut self, output: &Path) {
        self.successful += 1;
        info!(index = self.current_index, output = %output.display(), "Item succeeded");
    }

    pub fn mark_failure(&mut self, url: &str, error: &str) {
        self.failed.push(FailedItem {
            url: url.to_string(),
            error: error.to_string(),
            index: self.current_index,
        });
    }

    pub fn attempted(&self) -> usize {
        self.current_index
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    /// `"Processing Video i of n"`, with `": step"` when a step is given.
    pub fn progress_text(&self, step: &str) -> String {
        let base = format!("Processing Video {} of {}", self.current_index, self.planned);
        if step.is_empty() {
            base
        } else {
            format!("{}: {}", base, step)
        }
    }

    /// Fraction of the batch completed before the current item.
    pub fn progress_fraction(&self) -> f64 {
        if self.planned == 0 {
            return 0.0;
        }
        self.current_index.saturating_sub(1) as f64 / self.planned as f64
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::new(
            self.current_index,
            self.successful,
            self.failed.clone(),
            self.input_total - self.current_index.min(self.input_total),
        )
    }

    /// Write `failed_urls_report_<unix>.txt` into `dir`. Returns `None`
    /// without touching the filesystem when nothing failed.
    pub fn save_failed_report(&self, dir: &Path) -> WorkerResult<Option<PathBuf>> {
        if self.failed.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "failed_urls_report_{}.txt",
            chrono::Utc::now().timestamp()
        ));
        std::fs::write(&path, self.render_report())?;

        info!(report = %path.display(), failed = self.failed.len(), "Saved failed URLs report");
        Ok(Some(path))
    }

    fn render_report(&self) -> String {
        let mut report = String::from("BATCH PROCESSING FAILED URLS REPORT\n");
        report.push_str(&"=".repeat(50));
        report.push_str("\n\n");
        let _ = writeln!(report, "Total URLs processed: {}", self.current_index);
        let _ = writeln!(report, "Successful: {}", self.successful);
        let _ = writeln!(report, "Failed: {}\n", self.failed.len());

        for item in &self.failed {
            let _ = writeln!(report, "Video {}: {}", item.index, item.url);
            let _ = writeln!(report, "Error: {}\n", item.error);
        }
        report
    }
}
