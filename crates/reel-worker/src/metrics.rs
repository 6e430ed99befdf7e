//! Batch metrics. No-ops unless a recorder is installed.

use metrics::{counter, gauge, histogram};

pub mod names {
    pub const ITEMS_TOTAL: &str = "reel_items_total";
    pub const STAGE_DURATION_SECONDS: &str = "reel_stage_duration_seconds";
    pub const BATCHES_TOTAL: &str = "reel_batches_total";
    pub const BATCH_RUNNING: &str = "reel_batch_running";
}

/// Count a finished item by outcome (`success` or `failed`).
pub fn record_item(outcome: &'static str) {
    counter!(names::ITEMS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_stage(stage: &'static str, secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(secs);
}

pub fn record_batch_started() {
    counter!(names::BATCHES_TOTAL).increment(1);
    gauge!(names::BATCH_RUNNING).set(1.0);
}

pub fn record_batch_finished() {
    gauge!(names::BATCH_RUNNING).set(0.0);
}
