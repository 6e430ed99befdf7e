//! Batch item lifecycle.
//!
//! A [`BatchItem`] is created when a URL is enqueued and is only mutated by
//! the batch orchestrator. Once it reaches a terminal status it is frozen.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-item processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Enqueued, not started
    #[default]
    Pending,
    /// Fetching the post and its video
    Downloading,
    /// Generating title and caption
    Generating,
    /// Cropping and compositing the final video
    Processing,
    /// Output video written
    Success,
    /// A stage failed
    Failed,
}

impl ItemStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Downloading => "downloading",
            ItemStatus::Generating => "generating",
            ItemStatus::Processing => "processing",
            ItemStatus::Success => "success",
            ItemStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Success | ItemStatus::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected status change on a frozen item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("item is already {from}, cannot move to {to}")]
pub struct TransitionError {
    pub from: ItemStatus,
    pub to: ItemStatus,
}

/// Wall-clock seconds spent in each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ItemTimings {
    pub download_secs: f64,
    pub generation_secs: f64,
    pub processing_secs: f64,
    pub total_secs: f64,
}

/// One URL moving through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchItem {
    /// 1-based position in the (possibly truncated) batch
    pub index: usize,
    pub url: String,
    pub status: ItemStatus,
    /// Final video path, set on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Caption text file written next to the video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub timings: ItemTimings,
}

impl BatchItem {
    /// Create a pending item.
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            status: ItemStatus::Pending,
            output_path: None,
            caption_path: None,
            error: None,
            timings: ItemTimings::default(),
        }
    }

    /// Check if the item is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a new status. Terminal items reject every change.
    pub fn advance(&mut self, status: ItemStatus) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        Ok(())
    }

    /// Mark the item as succeeded with its outputs.
    pub fn succeed(
        &mut self,
        output_path: PathBuf,
        caption_path: Option<PathBuf>,
    ) -> Result<(), TransitionError> {
        self.advance(ItemStatus::Success)?;
        self.output_path = Some(output_path);
        self.caption_path = caption_path;
        Ok(())
    }

    /// Mark the item as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(ItemStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }
}
