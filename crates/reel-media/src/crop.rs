//! Auto-crop detection by background subtraction.
//!
//! Reels re-uploaded from other platforms often carry static borders,
//! blurred fills or captions baked around the real footage. The detector
//! estimates a static background as the per-pixel median of blurred sample
//! frames, diffs the middle frame against it and crops to the bounding box
//! of whatever moved.
//!
//! Detection is best effort: every failure path yields
//! [`CropDecision::FullFrame`] and the video is used uncropped.

use std::path::Path;

use image::{GrayImage, Luma};
use imageproc::contrast::threshold;
use imageproc::filter::separable_filter_equal;
use imageproc::map::map_colors2;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::frames::extract_gray_frames;
use crate::metrics;
use crate::probe::probe_video;
use reel_models::{CropDecision, CropGeometry, EncodingConfig, FullFrameReason};

/// Frames sampled across the video for the background estimate.
pub const DEFAULT_SAMPLE_COUNT: usize = 15;

const BLUR_RADIUS: usize = 10;
/// Sigma for a 21-tap kernel: 0.3 * ((21 - 1) / 2 - 1) + 0.8
const BLUR_SIGMA: f32 = 3.5;
const DIFF_THRESHOLD: u8 = 10;
const MIN_FOREGROUND_FRACTION: f64 = 0.01;
const PADDING: u32 = 5;
const MIN_SAMPLES: usize = 3;

/// Detects the moving-content region of a video.
#[derive(Debug, Clone)]
pub struct CropDetector {
    sample_count: usize,
}

impl Default for CropDetector {
    fn default() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
        }
    }
}

impl CropDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_count(mut self, sample_count: usize) -> Self {
        self.sample_count = sample_count.max(1);
        self
    }

    /// Probe, sample and analyze a video file. Never fails.
    pub async fn detect(&self, video_path: &Path) -> CropDecision {
        let decision = match self.sample_video(video_path).await {
            Ok(Some((samples, middle))) => self.analyze(&samples, &middle),
            Ok(None) => CropDecision::full_frame(FullFrameReason::DecodeFailed),
            Err(e) => {
                warn!(video = %video_path.display(), error = %e, "Crop detection failed, keeping full frame");
                CropDecision::full_frame(FullFrameReason::DecodeFailed)
            }
        };

        match decision {
            CropDecision::Crop(geometry) => {
                info!(
                    video = %video_path.display(),
                    x = geometry.x, y = geometry.y, w = geometry.width, h = geometry.height,
                    "Detected content region"
                );
                metrics::record_crop_decision("crop");
            }
            CropDecision::FullFrame { reason } => {
                info!(video = %video_path.display(), reason = reason.as_str(), "Keeping full frame");
                metrics::record_crop_decision(reason.as_str());
            }
        }

        decision
    }

    /// Decode the sample frames and the middle frame.
    async fn sample_video(&self, video_path: &Path) -> MediaResult<Option<(Vec<GrayImage>, GrayImage)>> {
        let info = probe_video(video_path).await?;
        let frame_count = info.frame_count();
        if frame_count == 0 {
            return Ok(None);
        }

        let indices = sample_indices(frame_count, self.sample_count);
        let middle_index = frame_count / 2;

        let mut wanted = indices.clone();
        wanted.push(middle_index);
        let frames = extract_gray_frames(video_path, info.width, info.height, &wanted).await?;

        let Some(middle) = frames.get(&middle_index).cloned() else {
            debug!(middle_index, "Middle frame could not be decoded");
            return Ok(None);
        };

        // Repeated indices contribute repeated samples, as a seek-per-sample reader would
        let samples = indices
            .iter()
            .filter_map(|index| frames.get(index).cloned())
            .collect();

        Ok(Some((samples, middle)))
    }

    /// Pure analysis over already-decoded grayscale frames.
    pub fn analyze(&self, samples: &[GrayImage], middle: &GrayImage) -> CropDecision {
        let (width, height) = middle.dimensions();
        let blurred: Vec<GrayImage> = samples
            .iter()
            .filter(|frame| frame.dimensions() == (width, height))
            .map(gaussian_blur)
            .collect();

        if blurred.len() < MIN_SAMPLES {
            return CropDecision::full_frame(FullFrameReason::TooFewSamples);
        }

        let background = median_frame(&blurred);
        let middle = gaussian_blur(middle);
        let mask = foreground_mask(&middle, &background);

        let mut moving = 0usize;
        let (mut x_min, mut y_min) = (u32::MAX, u32::MAX);
        let (mut x_max, mut y_max) = (0u32, 0u32);

        for (x, y, _) in mask.enumerate_pixels().filter(|(_, _, p)| p[0] > 0) {
            moving += 1;
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        let total = f64::from(width) * f64::from(height);
        if (moving as f64) < total * MIN_FOREGROUND_FRACTION {
            return CropDecision::full_frame(FullFrameReason::NoMotion);
        }

        let x_min = x_min.saturating_sub(PADDING);
        let y_min = y_min.saturating_sub(PADDING);
        let x_max = (x_max + PADDING).min(width);
        let y_max = (y_max + PADDING).min(height);

        let geometry = CropGeometry {
            x: x_min,
            y: y_min,
            width: x_max - x_min,
            height: y_max - y_min,
        };
        if !geometry.is_large_enough(width, height) {
            return CropDecision::full_frame(FullFrameReason::RegionTooSmall);
        }

        CropDecision::Crop(CropGeometry::even_aligned(
            geometry.x,
            geometry.y,
            geometry.width,
            geometry.height,
        ))
    }
}

/// Evenly spaced frame indices from first to last frame, truncated to integers.
pub fn sample_indices(frame_count: u64, samples: usize) -> Vec<u64> {
    if frame_count == 0 || samples == 0 {
        return Vec::new();
    }
    if samples == 1 {
        return vec![0];
    }
    let last = frame_count - 1;
    let steps = (samples - 1) as u64;
    (0..samples as u64).map(|i| i * last / steps).collect()
}

/// Re-encode `input` cropped to `geometry`.
pub async fn apply_crop(
    input: &Path,
    geometry: &CropGeometry,
    output: &Path,
    encoding: &EncodingConfig,
    with_audio: bool,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(input, output)
        .video_filter(geometry.to_filter())
        .encoding(encoding, with_audio);

    runner.run(&cmd).await
}

fn gaussian_kernel() -> [f32; 2 * BLUR_RADIUS + 1] {
    let mut kernel = [0f32; 2 * BLUR_RADIUS + 1];
    let denom = 2.0 * BLUR_SIGMA * BLUR_SIGMA;
    for (i, weight) in kernel.iter_mut().enumerate() {
        let d = i as f32 - BLUR_RADIUS as f32;
        *weight = (-(d * d) / denom).exp();
    }
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Separable 21x21 Gaussian blur.
fn gaussian_blur(frame: &GrayImage) -> GrayImage {
    separable_filter_equal(frame, &gaussian_kernel()[..])
}

/// Pixels whose blurred value moved more than the threshold away from the
/// background, as a 0/255 mask.
fn foreground_mask(frame: &GrayImage, background: &GrayImage) -> GrayImage {
    let diff: GrayImage = map_colors2(frame, background, |a: Luma<u8>, b: Luma<u8>| {
        Luma([a[0].abs_diff(b[0])])
    });
    threshold(&diff, DIFF_THRESHOLD)
}

/// Per-pixel median, truncated to u8.
fn median_frame(frames: &[GrayImage]) -> GrayImage {
    let (width, height) = frames[0].dimensions();
    let mut values = vec![0u8; frames.len()];
    let mut out = GrayImage::new(width, height);
    let mid = frames.len() / 2;

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        for (value, frame) in values.iter_mut().zip(frames) {
            *value = frame.get_pixel(x, y)[0];
        }
        values.sort_unstable();
        pixel[0] = if frames.len() % 2 == 1 {
            values[mid]
        } else {
            ((u16::from(values[mid - 1]) + u16::from(values[mid])) / 2) as u8
        };
    }

    out
}
