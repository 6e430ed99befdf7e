//! Crop geometry and the crop detector's outcome.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Minimum fraction of each source dimension a crop must keep.
pub const MIN_CROP_FRACTION: f64 = 0.25;

/// A pixel-space crop rectangle in source coordinates.
///
/// All four values are even so the result stays valid for yuv420p encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CropGeometry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropGeometry {
    /// Build a crop rounding every value down to the nearest even number.
    pub fn even_aligned(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x: x & !1,
            y: y & !1,
            width: width & !1,
            height: height & !1,
        }
    }

    /// Whether the crop keeps at least a quarter of both frame dimensions.
    pub fn is_large_enough(&self, frame_width: u32, frame_height: u32) -> bool {
        f64::from(self.width) >= MIN_CROP_FRACTION * f64::from(frame_width)
            && f64::from(self.height) >= MIN_CROP_FRACTION * f64::from(frame_height)
    }

    /// FFmpeg `crop` filter expression.
    pub fn to_filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// Why the detector kept the full frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FullFrameReason {
    /// Probing or frame decoding failed
    DecodeFailed,
    /// Fewer than three frames could be sampled
    TooFewSamples,
    /// Less than 1% of pixels differ from the background
    NoMotion,
    /// Moving region smaller than a quarter of the frame
    RegionTooSmall,
    /// Auto-crop switched off
    Disabled,
}

impl FullFrameReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FullFrameReason::DecodeFailed => "decode_failed",
            FullFrameReason::TooFewSamples => "too_few_samples",
            FullFrameReason::NoMotion => "no_motion",
            FullFrameReason::RegionTooSmall => "region_too_small",
            FullFrameReason::Disabled => "disabled",
        }
    }
}

/// Crop detection never fails: it either finds a region or keeps the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum CropDecision {
    Crop(CropGeometry),
    FullFrame { reason: FullFrameReason },
}

impl CropDecision {
    pub fn full_frame(reason: FullFrameReason) -> Self {
        Self::FullFrame { reason }
    }

    /// The crop to apply, if any.
    pub fn geometry(&self) -> Option<CropGeometry> {
        match self {
            CropDecision::Crop(geometry) => Some(*geometry),
            CropDecision::FullFrame { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_alignment_rounds_down() {
        let crop = CropGeometry::even_aligned(15, 7, 641, 1001);
        assert_eq!(crop, CropGeometry { x: 14, y: 6, width: 640, height: 1000 });
    }

    #[test]
    fn test_quarter_threshold() {
        let crop = CropGeometry::even_aligned(0, 0, 270, 480);
        assert!(crop.is_large_enough(1080, 1920));

        let narrow = CropGeometry::even_aligned(0, 0, 268, 1920);
        assert!(!narrow.is_large_enough(1080, 1920));
    }

    #[test]
    fn test_crop_filter_expression() {
        let crop = CropGeometry::even_aligned(10, 20, 300, 400);
        assert_eq!(crop.to_filter(), "crop=300:400:10:20");
        assert_eq!(CropDecision::Crop(crop).geometry(), Some(crop));
        assert!(CropDecision::full_frame(FullFrameReason::NoMotion).geometry().is_none());
    }
}
