//! End-of-run batch summary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A failed URL with its 1-based batch position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FailedItem {
    pub url: String,
    pub error: String,
    pub index: usize,
}

/// Outcome of one batch run.
///
/// `total` counts attempted items only. URLs dropped by quota truncation,
/// an early stop or a cancellation are reported in `not_attempted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub not_attempted: usize,
    pub failed_items: Vec<FailedItem>,
    /// `successful / total`, 0 when nothing was attempted
    pub completion_rate: f64,
}

impl BatchSummary {
    /// Assemble a summary, deriving the completion rate.
    pub fn new(
        total: usize,
        successful: usize,
        failed_items: Vec<FailedItem>,
        not_attempted: usize,
    ) -> Self {
        let completion_rate = if total == 0 {
            0.0
        } else {
            successful as f64 / total as f64
        };

        Self {
            total,
            successful,
            failed: failed_items.len(),
            not_attempted,
            failed_items,
            completion_rate,
        }
    }

    /// Whether every attempted item succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_arithmetic() {
        let failed = vec![FailedItem {
            url: "https://www.instagram.com/reel/b/".into(),
            error: "download failed".into(),
            index: 2,
        }];
        let summary = BatchSummary::new(4, 3, failed, 6);

        assert_eq!(summary.total, summary.successful + summary.failed);
        assert!((summary.completion_rate - 0.75).abs() < 1e-9);
        assert_eq!(summary.not_attempted, 6);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_empty_batch_has_zero_rate() {
        let summary = BatchSummary::new(0, 0, Vec::new(), 0);
        assert_eq!(summary.completion_rate, 0.0);
        assert!(summary.is_clean());
    }
}
