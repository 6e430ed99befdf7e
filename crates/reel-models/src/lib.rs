//! Shared data models for the reel rebranding pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Batch items, their lifecycle and the run summary
//! - Crop geometry and render layout
//! - Prompt templates and persisted batch settings
//! - Encoding configuration
//! - Instagram URL parsing

pub mod content;
pub mod crop;
pub mod encoding;
pub mod item;
pub mod layout;
pub mod settings;
pub mod summary;
pub mod template;
pub mod urls;

// Re-export common types
pub use content::{DownloadedPost, GeneratedContent, OcrOutcome, TitleSource};
pub use crop::{CropDecision, CropGeometry, FullFrameReason};
pub use encoding::EncodingConfig;
pub use item::{BatchItem, ItemStatus, ItemTimings, TransitionError};
pub use layout::{Region, RenderPlan, CANVAS_HEIGHT, CANVAS_WIDTH};
pub use settings::{validate_prefix, BatchSettings, SettingsError};
pub use summary::{BatchSummary, FailedItem};
pub use template::{fill_prompt, template_id_from_name, PromptTemplate, PromptVars};
pub use urls::{extract_shortcode, is_instagram_url, parse_url_list, ShortcodeError};
