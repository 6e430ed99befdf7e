//! Post content flowing between pipeline stages.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Result of text extraction from a video frame.
///
/// OCR is best effort: any failure becomes `Unavailable` with a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OcrOutcome {
    Text { text: String },
    Unavailable { message: String },
}

impl OcrOutcome {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Extracted text, empty when unavailable.
    pub fn text(&self) -> &str {
        match self {
            OcrOutcome::Text { text } => text,
            OcrOutcome::Unavailable { .. } => "",
        }
    }
}

/// A downloaded post ready for text generation and rendering.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadedPost {
    /// Local video file, owned by the item's working directory
    pub video_path: PathBuf,
    /// Post description, empty when the post has none
    pub original_caption: String,
    pub ocr: OcrOutcome,
    pub canonical_url: String,
    pub shortcode: String,
}

/// Where the final title came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TitleSource {
    /// Accepted model output
    Generated,
    /// First sentence of the original caption
    CaptionFallback,
    /// Fixed placeholder
    Placeholder,
    /// Title generation turned off
    Disabled,
}

/// Text that goes onto and alongside the rendered reel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedContent {
    /// Overlay title, empty when disabled
    pub title: String,
    /// Narrative caption saved next to the video
    pub caption: String,
    pub title_source: TitleSource,
}

impl GeneratedContent {
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}
