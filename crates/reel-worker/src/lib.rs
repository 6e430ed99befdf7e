//! Batch rebranding of Instagram reels.
//!
//! This crate provides:
//! - The batch processor (download, text generation, render per URL)
//! - Sequential output naming with a daily quota
//! - Progress tracking and the failed-URL report
//! - Title/caption generation through a chat completions API
//! - JSON stores for prompt templates, API keys and batch settings

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod naming;
pub mod orchestrator;
pub mod retry;
pub mod stages;
pub mod stores;
pub mod text_gen;
pub mod tracker;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, ItemLogger};
pub use naming::{caption_path, Allocation, NameAllocator, NamePrefix};
pub use orchestrator::{BatchOptions, BatchProcessor, ProgressCallback};
pub use stages::{ContentSource, InstagramSource, TextGenerator, VideoProducer};
pub use stores::{ApiKeyStore, SettingsStore, TemplateStore};
pub use text_gen::{ChatClient, TemplateGenerator};
pub use tracker::ProgressTracker;
