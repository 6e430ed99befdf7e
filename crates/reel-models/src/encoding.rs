//! Output encoding settings for rendered reels.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF for final renders
pub const DEFAULT_CRF: u8 = 20;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Pixel format accepted by every mobile player
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Video encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Output frame rate; `None` keeps the source rate
    #[serde(default)]
    pub fps: Option<f64>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            crf: DEFAULT_CRF,
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            fps: None,
        }
    }
}

impl EncodingConfig {
    /// Fast settings for intermediates that get re-encoded again (cropped source).
    pub fn for_intermediate() -> Self {
        Self {
            preset: "veryfast".to_string(),
            crf: 18,
            ..Default::default()
        }
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Pin the output frame rate, typically to the source rate.
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = (fps > 0.0).then_some(fps);
        self
    }

    /// Video arguments only.
    pub fn video_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            DEFAULT_PIXEL_FORMAT.to_string(),
        ];
        if let Some(fps) = self.fps {
            args.push("-r".to_string());
            args.push(format!("{:.3}", fps));
        }
        args
    }

    /// Full output arguments; audio settings are included only when the source has audio.
    pub fn to_ffmpeg_args(&self, with_audio: bool) -> Vec<String> {
        let mut args = self.video_args();
        if with_audio {
            args.extend([
                "-c:a".to_string(),
                self.audio_codec.clone(),
                "-b:a".to_string(),
                self.audio_bitrate.clone(),
            ]);
        } else {
            args.push("-an".to_string());
        }
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.audio_codec, "aac");
        assert!(config.fps.is_none());
    }

    #[test]
    fn test_ffmpeg_args_keep_source_fps() {
        let args = EncodingConfig::default().with_fps(29.97).to_ffmpeg_args(true);
        assert!(args.contains(&"-r".to_string()));
        assert!(args.contains(&"29.970".to_string()));
        assert!(args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_silent_source_drops_audio() {
        let args = EncodingConfig::default().to_ffmpeg_args(false);
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
        assert!(!args.contains(&"-r".to_string()));
    }
}
