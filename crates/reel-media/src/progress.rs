//! FFmpeg `-progress` snapshots.

use serde::{Deserialize, Serialize};

/// Progress information reported by FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    pub frame: u64,
    pub fps: f64,
    /// Output position in milliseconds
    pub out_time_ms: i64,
    /// Output position as HH:MM:SS.micro
    pub out_time: String,
    /// Encoding speed relative to realtime
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction of the output written, in `0.0..=1.0`.
    pub fn fraction(&self, total_secs: f64) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        if total_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / 1000.0 / total_secs).clamp(0.0, 1.0)
    }

    /// Estimated seconds left at the current speed.
    pub fn eta_seconds(&self, total_secs: f64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }
        let remaining = total_secs - self.out_time_ms as f64 / 1000.0;
        Some((remaining / self.speed).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_is_clamped() {
        let progress = FfmpegProgress {
            out_time_ms: 15_000,
            ..Default::default()
        };
        assert!((progress.fraction(30.0) - 0.5).abs() < 1e-9);
        assert_eq!(progress.fraction(10.0), 1.0);
        assert_eq!(progress.fraction(0.0), 0.0);
    }

    #[test]
    fn test_eta_at_double_speed() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            speed: 2.0,
            ..Default::default()
        };
        let eta = progress.eta_seconds(10.0).unwrap();
        assert!((eta - 2.5).abs() < 0.01);
    }
}
