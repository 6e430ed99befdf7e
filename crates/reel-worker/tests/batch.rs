//! Batch processor behavior with in-memory collaborators.

use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;
use tokio::sync::Notify;

use reel_media::{ReelOptions, RenderReport};
use reel_models::{
    BatchSettings, CropDecision, DownloadedPost, FullFrameReason, ItemStatus, OcrOutcome, Region,
    RenderPlan,
};
use reel_worker::{
    BatchOptions, BatchProcessor, ContentSource, TextGenerator, VideoProducer, WorkerError,
    WorkerResult,
};

#[derive(Default)]
struct FakeSource {
    /// Requests a stop while fetching this 1-based call
    stop_on_call: Option<usize>,
    processor: OnceLock<Weak<BatchProcessor>>,
    calls: Mutex<usize>,
    /// Blocks every fetch until notified
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch(&self, url: &str, work_dir: &Path) -> WorkerResult<DownloadedPost> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if self.stop_on_call == Some(call) {
            if let Some(processor) = self.processor.get().and_then(Weak::upgrade) {
                processor.request_stop();
            }
        }

        if url.contains("private") {
            return Err(WorkerError::download_failed("Login required"));
        }

        let shortcode = url.trim_end_matches('/').rsplit('/').next().unwrap().to_string();
        let video_path = work_dir.join(format!("{}.mp4", shortcode));
        tokio::fs::write(&video_path, b"source").await?;

        Ok(DownloadedPost {
            video_path,
            original_caption: if shortcode.starts_with("silent") {
                String::new()
            } else {
                format!("Story of {}. With more detail.", shortcode)
            },
            ocr: OcrOutcome::unavailable("no tesseract"),
            canonical_url: url.to_string(),
            shortcode,
        })
    }
}

struct FakeGenerator {
    title: Result<&'static str, &'static str>,
    caption: Option<&'static str>,
}

impl Default for FakeGenerator {
    fn default() -> Self {
        Self {
            title: Ok("A Generated Title"),
            caption: Some("A generated caption"),
        }
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate_title(&self, _: &str, _: &str, _: Option<&str>) -> WorkerResult<String> {
        match &self.title {
            Ok(title) => Ok(title.to_string()),
            Err(e) => Err(WorkerError::generation_failed(*e)),
        }
    }

    async fn generate_caption(&self, _: &str, _: &str, _: &str, _: Option<&str>) -> WorkerResult<String> {
        self.caption
            .map(str::to_string)
            .ok_or_else(|| WorkerError::generation_failed("API returned status 500"))
    }
}

#[derive(Default)]
struct FakeProducer {
    titles: Mutex<Vec<String>>,
}

#[async_trait]
impl VideoProducer for FakeProducer {
    async fn produce(
        &self,
        source: &Path,
        title: &str,
        output: &Path,
        _options: &ReelOptions,
    ) -> WorkerResult<RenderReport> {
        self.titles.lock().unwrap().push(title.to_string());

        if source.to_string_lossy().contains("broken") {
            return Err(WorkerError::render_failed("FFmpeg command failed"));
        }
        tokio::fs::write(output, b"reel").await?;

        let canvas = Region::new(0, 0, 1080, 1920);
        Ok(RenderReport {
            crop: CropDecision::full_frame(FullFrameReason::Disabled),
            plan: RenderPlan {
                canvas,
                video: canvas,
                header: None,
                title: None,
                logo: None,
                title_suppressed: false,
            },
        })
    }
}

struct Harness {
    processor: Arc<BatchProcessor>,
    producer: Arc<FakeProducer>,
    output: TempDir,
    _temp: TempDir,
}

fn harness(source: FakeSource, generator: FakeGenerator) -> Harness {
    let output = TempDir::new().unwrap();
    let temp = TempDir::new().unwrap();
    let source = Arc::new(source);
    let producer = Arc::new(FakeProducer::default());

    let processor = Arc::new(BatchProcessor::new(
        source.clone(),
        Arc::new(generator),
        producer.clone(),
        output.path(),
        temp.path(),
    ));
    source.processor.set(Arc::downgrade(&processor)).ok();

    Harness {
        processor,
        producer,
        output,
        _temp: temp,
    }
}

fn urls(names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|n| format!("https://www.instagram.com/reel/{}/", n))
        .collect()
}

fn options(limit: u32) -> BatchOptions {
    let settings = BatchSettings {
        custom_prefix: "5".into(),
        daily_limit: limit,
        ..Default::default()
    };
    BatchOptions::new(settings).with_today(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
}

fn files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_batch_truncated_to_remaining_quota() {
    let h = harness(FakeSource::default(), FakeGenerator::default());
    std::fs::write(h.output.path().join("5-1.mp4"), b"earlier").unwrap();

    let all: Vec<String> = (0..10).map(|i| format!("post{}", i)).collect();
    let names: Vec<&str> = all.iter().map(String::as_str).collect();

    let summary = h
        .processor
        .process_batch(&urls(&names), &options(3).with_report_dir(h.output.path().join("reports")))
        .await
        .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.not_attempted, 8);
    assert_eq!(summary.completion_rate, 1.0);
    assert_eq!(
        files(h.output.path()),
        vec!["5-1.mp4", "5-2.mp4", "5-2_caption.txt", "5-3.mp4", "5-3_caption.txt"]
    );
    assert_eq!(
        std::fs::read_to_string(h.output.path().join("5-2_caption.txt")).unwrap(),
        "A generated caption"
    );
}

#[tokio::test]
async fn test_exhausted_quota_is_batch_fatal() {
    let h = harness(FakeSource::default(), FakeGenerator::default());
    for name in ["5-1.mp4", "5-2.mp4"] {
        std::fs::write(h.output.path().join(name), b"earlier").unwrap();
    }

    let err = h
        .processor
        .process_batch(&urls(&["a"]), &options(2))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::QuotaExhausted { limit: 2, .. }));
    assert!(err.is_batch_fatal());
    assert!(h.producer.titles.lock().unwrap().is_empty());
    assert!(!h.processor.is_running());
}

#[tokio::test]
async fn test_gapped_fixed_prefix_counts_from_highest_index() {
    let h = harness(FakeSource::default(), FakeGenerator::default());
    for name in ["promo-1.mp4", "promo-3.mp4"] {
        std::fs::write(h.output.path().join(name), b"earlier").unwrap();
    }
    let mut opts = options(3);
    opts.settings.custom_prefix = "promo".into();

    let err = h
        .processor
        .process_batch(&urls(&["a", "b"]), &opts)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::QuotaExhausted { limit: 3, .. }));
    assert!(h.producer.titles.lock().unwrap().is_empty());
    assert!(h.processor.last_items().is_empty());
}

#[tokio::test]
async fn test_invalid_settings_rejected() {
    let h = harness(FakeSource::default(), FakeGenerator::default());
    let mut opts = options(5);
    opts.settings.custom_prefix = "a/b".into();

    let err = h.processor.process_batch(&urls(&["a"]), &opts).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidSettings(_)));
    assert!(files(h.output.path()).is_empty());
}

#[tokio::test]
async fn test_failure_stops_batch_without_continue() {
    let h = harness(FakeSource::default(), FakeGenerator::default());
    let mut opts = options(10).with_report_dir(h.output.path().join("reports"));
    opts.settings.continue_on_error = false;

    let summary = h
        .processor
        .process_batch(&urls(&["one", "private", "three", "four"]), &opts)
        .await
        .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.not_attempted, 2);
    assert_eq!(summary.failed_items[0].index, 2);
    assert_eq!(summary.failed_items[0].error, "Download failed: Login required");

    let reports = files(&h.output.path().join("reports"));
    assert_eq!(reports.len(), 1);
    assert!(reports[0].starts_with("failed_urls_report_"));
}

#[tokio::test]
async fn test_render_failure_keeps_numbering_gap_free() {
    let h = harness(FakeSource::default(), FakeGenerator::default());
    let mut opts = options(10);
    opts.settings.save_failed_report = false;

    let summary = h
        .processor
        .process_batch(&urls(&["first", "broken", "third"]), &opts)
        .await
        .unwrap();

    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        files(h.output.path()),
        vec!["5-1.mp4", "5-1_caption.txt", "5-2.mp4", "5-2_caption.txt"]
    );

    let items = h.processor.last_items();
    assert_eq!(items[1].status, ItemStatus::Failed);
    assert_eq!(items[2].output_path, Some(h.output.path().join("5-2.mp4")));
}

#[tokio::test]
async fn test_stop_between_stages_fails_in_flight_item() {
    let source = FakeSource {
        stop_on_call: Some(2),
        ..Default::default()
    };
    let h = harness(source, FakeGenerator::default());

    let summary = h
        .processor
        .process_batch(&urls(&["a", "b", "c", "d"]), &options(10))
        .await
        .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.not_attempted, 2);
    assert_eq!(summary.failed_items[0].error, "Stopped before text generation");

    let items = h.processor.last_items();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item.is_terminal()));
}

#[tokio::test]
async fn test_stop_sent_before_start_is_honored_once() {
    let h = harness(FakeSource::default(), FakeGenerator::default());
    h.processor.request_stop();

    let summary = h
        .processor
        .process_batch(&urls(&["a", "b"]), &options(10))
        .await
        .unwrap();
    assert_eq!(summary.total, 0);
    assert_eq!(summary.not_attempted, 2);
    assert!(!*h.processor.stop_signal().borrow());

    let summary = h
        .processor
        .process_batch(&urls(&["a", "b"]), &options(10))
        .await
        .unwrap();
    assert_eq!(summary.successful, 2);
}

#[tokio::test]
async fn test_concurrent_batch_rejected() {
    let gate = Arc::new(Notify::new());
    let source = FakeSource {
        gate: Some(gate.clone()),
        ..Default::default()
    };
    let h = harness(source, FakeGenerator::default());

    let first = tokio::spawn({
        let processor = h.processor.clone();
        let urls = urls(&["a"]);
        async move { processor.process_batch(&urls, &options(10)).await }
    });

    while !h.processor.is_running() {
        tokio::task::yield_now().await;
    }
    let err = h
        .processor
        .process_batch(&urls(&["b"]), &options(10))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::BatchAlreadyRunning));

    gate.notify_one();
    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.successful, 1);
    assert!(!h.processor.is_running());
}

#[tokio::test]
async fn test_rejected_title_falls_back_to_caption() {
    let generator = FakeGenerator {
        title: Ok("API Error: rate limited"),
        caption: None,
    };
    let h = harness(FakeSource::default(), generator);

    h.processor
        .process_batch(&urls(&["diana"]), &options(10))
        .await
        .unwrap();

    assert_eq!(h.producer.titles.lock().unwrap().as_slice(), ["Story of diana"]);
    let caption = std::fs::read_to_string(h.output.path().join("5-1_caption.txt")).unwrap();
    assert_eq!(
        caption,
        "AI Caption Generation Failed. Original Caption:\n\nStory of diana. With more detail."
    );
}

#[tokio::test]
async fn test_empty_title_and_caption_use_placeholder() {
    let generator = FakeGenerator {
        title: Ok("   "),
        ..Default::default()
    };
    let h = harness(FakeSource::default(), generator);

    h.processor
        .process_batch(&urls(&["silent1"]), &options(10))
        .await
        .unwrap();
    assert_eq!(h.producer.titles.lock().unwrap().as_slice(), ["Untold Story"]);
}

#[tokio::test]
async fn test_disabled_title_renders_without_one() {
    let h = harness(FakeSource::default(), FakeGenerator::default());
    let mut opts = options(10);
    opts.settings.generate_title = false;

    h.processor.process_batch(&urls(&["x"]), &opts).await.unwrap();
    assert_eq!(h.producer.titles.lock().unwrap().as_slice(), [""]);
}

#[tokio::test]
async fn test_progress_reported_per_stage() {
    let output = TempDir::new().unwrap();
    let temp = TempDir::new().unwrap();
    let seen: Arc<Mutex<Vec<(f64, String)>>> = Arc::default();

    let processor = BatchProcessor::new(
        Arc::new(FakeSource::default()),
        Arc::new(FakeGenerator::default()),
        Arc::new(FakeProducer::default()),
        output.path(),
        temp.path(),
    )
    .with_progress({
        let seen = seen.clone();
        Arc::new(move |fraction: f64, text: &str| {
            seen.lock().unwrap().push((fraction, text.to_string()));
        })
    });

    processor
        .process_batch(&urls(&["a", "b"]), &options(10))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], (0.0, "Processing Video 1 of 2: Downloading video".to_string()));
    assert!(seen.contains(&(0.5, "Processing Video 2 of 2: Processing video".to_string())));
    assert_eq!(seen.last().unwrap(), &(1.0, "Batch complete".to_string()));
    // Working directories are cleaned up
    assert!(files(temp.path()).is_empty());
}
