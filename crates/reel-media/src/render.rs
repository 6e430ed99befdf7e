//! Full reel pipeline: optional auto-crop followed by compositing.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::command::FfmpegRunner;
use crate::compositor::{BrandingAssets, Compositor, RenderOptions};
use crate::crop::{apply_crop, CropDetector};
use crate::error::MediaResult;
use crate::probe::probe_video;
use reel_models::{CropDecision, EncodingConfig, FullFrameReason, RenderPlan};

/// What happened to one video on its way to the output file.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub crop: CropDecision,
    pub plan: RenderPlan,
}

/// Options for a single reel.
#[derive(Debug, Clone)]
pub struct ReelOptions {
    pub auto_crop: bool,
    pub compositor: RenderOptions,
}

impl Default for ReelOptions {
    fn default() -> Self {
        Self {
            auto_crop: true,
            compositor: RenderOptions::default(),
        }
    }
}

/// Crops and composites source videos into finished reels.
///
/// Intermediate files live in a per-render temporary directory that is
/// removed when the render returns, successful or not.
#[derive(Debug, Clone)]
pub struct ReelRenderer {
    detector: CropDetector,
    compositor: Compositor,
    runner: FfmpegRunner,
    temp_root: Option<PathBuf>,
}

impl ReelRenderer {
    pub fn new(assets: BrandingAssets, runner: FfmpegRunner) -> Self {
        Self {
            detector: CropDetector::new(),
            compositor: Compositor::new(assets, runner.clone()),
            runner,
            temp_root: None,
        }
    }

    pub fn with_detector(mut self, detector: CropDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Create scratch directories under `dir` instead of the system temp dir.
    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    fn scratch_dir(&self) -> MediaResult<TempDir> {
        let dir = match &self.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                tempfile::Builder::new().prefix("reel-").tempdir_in(root)?
            }
            None => tempfile::Builder::new().prefix("reel-").tempdir()?,
        };
        Ok(dir)
    }

    /// Render `source` with `title` into `output`.
    pub async fn render(
        &self,
        source: &Path,
        title: &str,
        output: &Path,
        options: &ReelOptions,
    ) -> MediaResult<RenderReport> {
        let scratch = self.scratch_dir()?;

        let crop = if options.auto_crop {
            self.detector.detect(source).await
        } else {
            CropDecision::full_frame(FullFrameReason::Disabled)
        };

        let video = match crop.geometry() {
            Some(geometry) => {
                let cropped = scratch.path().join("cropped.mp4");
                let has_audio = probe_video(source).await?.has_audio;
                match apply_crop(
                    source,
                    &geometry,
                    &cropped,
                    &EncodingConfig::for_intermediate(),
                    has_audio,
                    &self.runner,
                )
                .await
                {
                    Ok(()) => cropped,
                    Err(e) => {
                        warn!(error = %e, "Crop encode failed, compositing full frame");
                        source.to_path_buf()
                    }
                }
            }
            None => source.to_path_buf(),
        };

        let plan = self
            .compositor
            .render(&video, title, output, scratch.path(), &options.compositor)
            .await?;

        info!(
            source = %source.display(),
            output = %output.display(),
            cropped = crop.geometry().is_some(),
            title_shown = plan.title.is_some(),
            "Reel complete"
        );

        Ok(RenderReport { crop, plan })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_under_root() {
        let root = tempfile::tempdir().unwrap();
        let renderer = ReelRenderer::new(BrandingAssets::from_dir(root.path()), FfmpegRunner::new())
            .with_temp_root(root.path().join("work"));

        let scratch = renderer.scratch_dir().unwrap();
        assert!(scratch.path().starts_with(root.path().join("work")));
        let path = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let root = tempfile::tempdir().unwrap();
        let renderer = ReelRenderer::new(BrandingAssets::from_dir(root.path()), FfmpegRunner::new());
        let options = ReelOptions {
            auto_crop: false,
            ..Default::default()
        };

        let result = renderer
            .render(
                &root.path().join("missing.mp4"),
                "Title",
                &root.path().join("out.mp4"),
                &options,
            )
            .await;
        assert!(result.is_err());
        assert!(!root.path().join("out.mp4").exists());
    }
}
