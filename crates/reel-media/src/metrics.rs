//! Media-level metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FFMPEG_DURATION_SECONDS: &str = "reel_ffmpeg_duration_seconds";
    pub const FFMPEG_RUNS_TOTAL: &str = "reel_ffmpeg_runs_total";
    pub const CROP_DECISIONS_TOTAL: &str = "reel_crop_decisions_total";
}

/// Record one FFmpeg invocation.
pub fn record_ffmpeg_run(duration_secs: f64, success: bool) {
    let labels = [("status", if success { "ok" } else { "error" }.to_string())];
    counter!(names::FFMPEG_RUNS_TOTAL, &labels).increment(1);
    histogram!(names::FFMPEG_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the crop detector's decision (`crop` or a full-frame reason).
pub fn record_crop_decision(decision: &str) {
    let labels = [("decision", decision.to_string())];
    counter!(names::CROP_DECISIONS_TOTAL, &labels).increment(1);
}
