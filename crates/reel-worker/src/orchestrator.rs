//! Batch processor: runs URLs through download, text generation and
//! rendering one at a time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use tokio::sync::watch;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::ItemLogger;
use crate::metrics;
use crate::naming::{caption_path, NameAllocator, NamePrefix};
use crate::stages::{ContentSource, TextGenerator, VideoProducer};
use crate::text_gen::{accept_title, failed_caption, fallback_title};
use crate::tracker::ProgressTracker;
use reel_media::compositor::RenderOptions;
use reel_media::{remove_with_retry, ReelOptions};
use reel_models::{
    BatchItem, BatchSettings, BatchSummary, DownloadedPost, EncodingConfig, GeneratedContent,
    ItemStatus, TitleSource,
};

/// Called with `(fraction, status_text)` whenever a stage starts.
pub type ProgressCallback = Arc<dyn Fn(f64, &str) + Send + Sync>;

const SOURCE_REMOVE_ATTEMPTS: u32 = 5;
const SOURCE_REMOVE_DELAY: Duration = Duration::from_secs(1);

/// Everything one batch run needs to know.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub settings: BatchSettings,
    /// Day used for the date prefix
    pub today: NaiveDate,
    /// Where the failed-URL report goes; defaults to the output directory
    pub report_dir: Option<PathBuf>,
    pub encoding: EncodingConfig,
}

impl BatchOptions {
    pub fn new(settings: BatchSettings) -> Self {
        Self {
            settings,
            today: Local::now().date_naive(),
            report_dir: None,
            encoding: EncodingConfig::default(),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Output name prefix: the custom token, or today's day of month.
    pub fn prefix(&self) -> NamePrefix {
        if self.settings.use_custom_prefix {
            NamePrefix::from_custom(&self.settings.custom_prefix, self.today)
        } else {
            NamePrefix::Day(self.today)
        }
    }

    pub fn reel_options(&self) -> ReelOptions {
        ReelOptions {
            auto_crop: self.settings.auto_crop,
            compositor: RenderOptions {
                add_branding: self.settings.add_branding,
                add_logo: self.settings.add_logo,
                encoding: self.encoding.clone(),
            },
        }
    }
}

/// Clears the running flag and any pending stop on every exit path.
struct RunningGuard<'a> {
    running: &'a AtomicBool,
    stop_tx: &'a watch::Sender<bool>,
}

impl<'a> RunningGuard<'a> {
    fn acquire(running: &'a AtomicBool, stop_tx: &'a watch::Sender<bool>) -> WorkerResult<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WorkerError::BatchAlreadyRunning)?;
        metrics::record_batch_started();
        Ok(Self { running, stop_tx })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.stop_tx.send_replace(false);
        self.running.store(false, Ordering::Release);
        metrics::record_batch_finished();
    }
}

/// Sequential batch runner.
pub struct BatchProcessor {
    source: Arc<dyn ContentSource>,
    generator: Arc<dyn TextGenerator>,
    producer: Arc<dyn VideoProducer>,
    allocator: NameAllocator,
    temp_dir: PathBuf,
    running: AtomicBool,
    stop_tx: watch::Sender<bool>,
    progress: Option<ProgressCallback>,
    last_items: Mutex<Vec<BatchItem>>,
}

impl BatchProcessor {
    pub fn new(
        source: Arc<dyn ContentSource>,
        generator: Arc<dyn TextGenerator>,
        producer: Arc<dyn VideoProducer>,
        output_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            source,
            generator,
            producer,
            allocator: NameAllocator::new(output_dir),
            temp_dir: temp_dir.into(),
            running: AtomicBool::new(false),
            stop_tx,
            progress: None,
            last_items: Mutex::new(Vec::new()),
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the running batch to stop at the next checkpoint. A stop sent
    /// before the batch starts applies to it; the flag clears when a run ends.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
        info!("Stop requested");
    }

    /// Receiver that flips to `true` when a stop is requested.
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    fn stop_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Fail with "stopped before `<stage>`" if a stop arrived.
    fn checkpoint(&self, stage: &'static str) -> WorkerResult<()> {
        if self.stop_requested() {
            return Err(WorkerError::Stopped(stage));
        }
        Ok(())
    }

    fn report(&self, fraction: f64, text: &str) {
        if let Some(callback) = &self.progress {
            callback(fraction, text);
        }
    }

    /// Items of the most recent run, in processing order.
    pub fn last_items(&self) -> Vec<BatchItem> {
        self.last_items
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// Run a batch.
    ///
    /// Returns batch-fatal errors (already running, invalid settings, quota
    /// exhausted) before touching any URL. Per-item failures end up in the
    /// summary.
    pub async fn process_batch(
        &self,
        urls: &[String],
        options: &BatchOptions,
    ) -> WorkerResult<BatchSummary> {
        let _guard = RunningGuard::acquire(&self.running, &self.stop_tx)?;
        options.settings.validate()?;

        let prefix = options.prefix();
        let daily_limit = options.settings.daily_limit;

        let mut batch = urls;
        if options.settings.use_custom_prefix {
            let remaining = self.allocator.remaining_slots(&prefix, daily_limit)? as usize;
            if remaining == 0 {
                return Err(WorkerError::QuotaExhausted {
                    prefix: prefix.token(),
                    limit: daily_limit,
                });
            }
            if urls.len() > remaining {
                warn!(
                    requested = urls.len(),
                    remaining,
                    prefix = %prefix.token(),
                    "Daily limit allows only part of the batch, truncating"
                );
                batch = &urls[..remaining];
            }
        }

        if let Ok(mut items) = self.last_items.lock() {
            items.clear();
        }

        let batch_id = Uuid::new_v4();
        info!(%batch_id, urls = batch.len(), prefix = %prefix.token(), daily_limit, "Batch started");
        let mut tracker = ProgressTracker::new(batch.len(), urls.len());

        for url in batch {
            if self.stop_requested() {
                info!(attempted = tracker.attempted(), "Batch stopped by request");
                break;
            }

            let index = tracker.start_next(url);
            let mut item = BatchItem::new(index, url.as_str());
            let mut logger = ItemLogger::new(index, batch.len(), url);
            logger.log_start();

            let span = logger.create_span();
            let result = self
                .process_item(&mut item, &mut logger, &tracker, &prefix, options)
                .instrument(span)
                .await;

            let keep_going = match result {
                Ok((output, caption)) => {
                    logger.log_completion(&output.display().to_string(), item.timings.total_secs);
                    tracker.mark_success(&output);
                    item.succeed(output, caption)?;
                    metrics::record_item("success");
                    true
                }
                Err(e) => {
                    let message = e.to_string();
                    logger.log_error(&message);
                    tracker.mark_failure(url, &message);
                    item.fail(message)?;
                    metrics::record_item("failed");
                    if !options.settings.continue_on_error {
                        warn!(index, "Stopping batch after failure");
                    }
                    options.settings.continue_on_error
                }
            };

            if let Ok(mut items) = self.last_items.lock() {
                items.push(item);
            }
            if !keep_going {
                break;
            }
        }

        if options.settings.save_failed_report {
            let dir = options
                .report_dir
                .clone()
                .unwrap_or_else(|| self.allocator.output_dir().to_path_buf());
            if let Err(e) = tracker.save_failed_report(&dir) {
                error!(error = %e, "Failed to save failed URLs report");
            }
        }

        let summary = tracker.summary();
        self.report(1.0, "Batch complete");
        info!(
            %batch_id,
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            not_attempted = summary.not_attempted,
            "Batch finished"
        );
        Ok(summary)
    }

    /// One item through every stage. Returns the video and caption paths.
    async fn process_item(
        &self,
        item: &mut BatchItem,
        logger: &mut ItemLogger,
        tracker: &ProgressTracker,
        prefix: &NamePrefix,
        options: &BatchOptions,
    ) -> WorkerResult<(PathBuf, Option<PathBuf>)> {
        let started = Instant::now();
        let fraction = tracker.progress_fraction();

        std::fs::create_dir_all(&self.temp_dir)?;
        let work_dir = tempfile::Builder::new()
            .prefix("item-")
            .tempdir_in(&self.temp_dir)?;

        // Download
        logger.stage("download");
        item.advance(ItemStatus::Downloading)?;
        self.report(fraction, &tracker.progress_text("Downloading video"));
        let stage_start = Instant::now();
        let post = self.source.fetch(&item.url, work_dir.path()).await?;
        item.timings.download_secs = stage_start.elapsed().as_secs_f64();
        metrics::record_stage("download", item.timings.download_secs);

        // Text generation
        self.checkpoint("text generation")?;
        logger.stage("generation");
        item.advance(ItemStatus::Generating)?;
        self.report(fraction, &tracker.progress_text("Generating title and caption"));
        let stage_start = Instant::now();
        let content = self.generate_content(&post, options, logger).await;
        item.timings.generation_secs = stage_start.elapsed().as_secs_f64();
        metrics::record_stage("generation", item.timings.generation_secs);

        // Render
        self.checkpoint("render")?;
        logger.stage("render");
        item.advance(ItemStatus::Processing)?;
        self.report(fraction, &tracker.progress_text("Processing video"));
        let stage_start = Instant::now();

        let allocation = self.allocator.allocate(prefix, options.settings.daily_limit)?;
        let rendered = self
            .producer
            .produce(&post.video_path, &content.title, &allocation.path, &options.reel_options())
            .await;
        if let Err(e) = rendered {
            self.allocator.release(&allocation);
            return Err(e);
        }
        item.timings.processing_secs = stage_start.elapsed().as_secs_f64();
        metrics::record_stage("render", item.timings.processing_secs);

        let caption_file = caption_path(&allocation.path);
        tokio::fs::write(&caption_file, &content.caption).await?;

        if !remove_with_retry(&post.video_path, SOURCE_REMOVE_ATTEMPTS, SOURCE_REMOVE_DELAY).await {
            logger.log_warning("Could not delete downloaded source video");
        }

        item.timings.total_secs = started.elapsed().as_secs_f64();
        Ok((allocation.path, Some(caption_file)))
    }

    /// Title and caption for a post. Never fails: every generator problem
    /// has a text fallback.
    async fn generate_content(
        &self,
        post: &DownloadedPost,
        options: &BatchOptions,
        logger: &ItemLogger,
    ) -> GeneratedContent {
        let caption = post.original_caption.as_str();
        let ocr = post.ocr.text();
        let template_id = options.settings.template_id.as_deref();

        let (title, title_source) = if !options.settings.generate_title {
            (String::new(), TitleSource::Disabled)
        } else {
            match self.generator.generate_title(caption, ocr, template_id).await {
                Ok(raw) => match accept_title(&raw) {
                    Some(title) => (title, TitleSource::Generated),
                    None => {
                        logger.log_warning(&format!("Rejected generated title: {:?}", raw));
                        fallback_title(caption)
                    }
                },
                Err(e) => {
                    logger.log_warning(&format!("Title generation failed: {}", e));
                    fallback_title(caption)
                }
            }
        };

        let generated_caption = match self
            .generator
            .generate_caption(caption, ocr, &title, template_id)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => failed_caption(caption),
            Err(e) => {
                logger.log_warning(&format!("Caption generation failed: {}", e));
                failed_caption(caption)
            }
        };

        GeneratedContent {
            title,
            caption: generated_caption,
            title_source,
        }
    }

    pub fn output_dir(&self) -> &Path {
        self.allocator.output_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_prefix_from_settings() {
        let mut settings = BatchSettings::default();
        settings.custom_prefix = "7".into();
        let options = BatchOptions::new(settings.clone()).with_today(date(2024, 5, 20));
        assert_eq!(options.prefix(), NamePrefix::Day(date(2024, 5, 7)));

        settings.use_custom_prefix = false;
        let options = BatchOptions::new(settings).with_today(date(2024, 5, 20));
        assert_eq!(options.prefix().token(), "20");
    }

    #[test]
    fn test_reel_options_follow_toggles() {
        let mut settings = BatchSettings::default();
        settings.auto_crop = false;
        settings.add_logo = false;

        let reel = BatchOptions::new(settings).reel_options();
        assert!(!reel.auto_crop);
        assert!(!reel.compositor.add_logo);
        assert!(reel.compositor.add_branding);
    }

    #[test]
    fn test_running_guard_releases() {
        let flag = AtomicBool::new(false);
        let (stop_tx, stop_rx) = watch::channel(false);
        {
            let _guard = RunningGuard::acquire(&flag, &stop_tx).unwrap();
            assert!(matches!(
                RunningGuard::acquire(&flag, &stop_tx),
                Err(WorkerError::BatchAlreadyRunning)
            ));
            stop_tx.send_replace(true);
        }
        assert!(!flag.load(Ordering::Acquire));
        assert!(!*stop_rx.borrow());
        assert!(RunningGuard::acquire(&flag, &stop_tx).is_ok());
    }
}
