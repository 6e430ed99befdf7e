//! Burned-in text extraction with the tesseract CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::{check_tesseract, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;
use reel_models::OcrOutcome;

/// Reads the text shown in the middle frame of a video.
#[derive(Debug, Clone, Default)]
pub struct OcrExtractor {
    runner: FfmpegRunner,
    tesseract: Option<PathBuf>,
}

impl OcrExtractor {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            tesseract: None,
        }
    }

    /// Use a specific tesseract binary instead of the one on PATH.
    pub fn with_tesseract(mut self, path: impl Into<PathBuf>) -> Self {
        self.tesseract = Some(path.into());
        self
    }

    /// Extract text from the middle frame. Never fails: problems become
    /// [`OcrOutcome::Unavailable`].
    pub async fn extract(&self, video_path: &Path, work_dir: &Path) -> OcrOutcome {
        match self.try_extract(video_path, work_dir).await {
            Ok(text) => {
                info!(chars = text.chars().count(), "OCR extracted text");
                OcrOutcome::Text { text }
            }
            Err(e) => {
                warn!(video = %video_path.display(), error = %e, "OCR unavailable");
                OcrOutcome::unavailable(e.to_string())
            }
        }
    }

    async fn try_extract(&self, video_path: &Path, work_dir: &Path) -> MediaResult<String> {
        let tesseract = match &self.tesseract {
            Some(path) => path.clone(),
            None => check_tesseract()?,
        };

        let info = probe_video(video_path).await?;
        if info.frame_count() == 0 {
            return Err(MediaError::ocr_failed("Video has no frames"));
        }

        let frame = work_dir.join("ocr_frame.png");
        let cmd = FfmpegCommand::new(video_path, &frame)
            .seek(info.duration / 2.0)
            .single_frame();
        self.runner.run(&cmd).await?;

        let output = Command::new(&tesseract)
            .arg(&frame)
            .arg("stdout")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if let Err(e) = tokio::fs::remove_file(&frame).await {
            debug!(error = %e, "Failed to remove OCR frame");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::ocr_failed(stderr.trim().to_string()));
        }

        Ok(clean_ocr_text(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Trim the text and drop tesseract's blank lines and form feeds.
fn clean_ocr_text(raw: &str) -> String {
    raw.replace('\u{c}', "")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
