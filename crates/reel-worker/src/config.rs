//! Worker configuration.

use std::path::PathBuf;

use reel_media::crop::DEFAULT_SAMPLE_COUNT;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Finished reels and caption files
    pub output_dir: PathBuf,
    /// Per-item working directories
    pub temp_dir: PathBuf,
    /// Persisted stores (keys, templates, batch settings)
    pub config_dir: PathBuf,
    /// Profile picture, logo and fonts
    pub assets_dir: PathBuf,
    /// Overrides `<assets_dir>/fonts/font.ttf`
    pub font_path: Option<PathBuf>,
    /// Fallback key when the key store is empty
    pub groq_api_key: Option<String>,
    pub groq_base_url: String,
    pub groq_model: String,
    /// Netscape cookies for logged-in downloads
    pub cookies_file: Option<PathBuf>,
    /// Per FFmpeg invocation
    pub ffmpeg_timeout_secs: u64,
    pub crop_samples: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            temp_dir: std::env::temp_dir().join("reels"),
            config_dir: PathBuf::from("config"),
            assets_dir: PathBuf::from("assets"),
            font_path: None,
            groq_api_key: None,
            groq_base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            cookies_file: None,
            ffmpeg_timeout_secs: 1800,
            crop_samples: DEFAULT_SAMPLE_COUNT,
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    non_empty(key).map(PathBuf::from)
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            output_dir: env_path("REELS_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            temp_dir: env_path("REELS_TEMP_DIR").unwrap_or(defaults.temp_dir),
            config_dir: env_path("REELS_CONFIG_DIR").unwrap_or(defaults.config_dir),
            assets_dir: env_path("REELS_ASSETS_DIR").unwrap_or(defaults.assets_dir),
            font_path: env_path("REELS_FONT_PATH"),
            groq_api_key: non_empty("GROQ_API_KEY"),
            groq_base_url: non_empty("GROQ_BASE_URL").unwrap_or(defaults.groq_base_url),
            groq_model: non_empty("GROQ_MODEL").unwrap_or(defaults.groq_model),
            cookies_file: env_path("REELS_COOKIES_FILE"),
            ffmpeg_timeout_secs: std::env::var("REELS_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ffmpeg_timeout_secs),
            crop_samples: std::env::var("REELS_CROP_SAMPLES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.crop_samples),
        }
    }
}
