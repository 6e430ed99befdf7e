#![deny(unreachable_patterns)]
//! Media tooling for the reel pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with progress and timeout
//! - FFprobe metadata and grayscale frame extraction
//! - Auto-crop detection by background subtraction
//! - The overlay compositor (title, profile picture header, logo)
//! - yt-dlp post download and tesseract OCR wrappers

pub mod command;
pub mod compositor;
pub mod crop;
pub mod download;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod metrics;
pub mod ocr;
pub mod probe;
pub mod progress;
pub mod render;

pub use command::{check_ffmpeg, check_tesseract, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use compositor::{BrandingAssets, Compositor, RenderOptions};
pub use crop::{apply_crop, CropDetector};
pub use download::{PostDownloader, PostMedia};
pub use error::{MediaError, MediaResult};
pub use fs_utils::remove_with_retry;
pub use ocr::OcrExtractor;
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use render::{ReelOptions, ReelRenderer, RenderReport};
