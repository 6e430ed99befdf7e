//! `reel-batch`: rebrand a list of Instagram reels.
//!
//! Usage: `reel-batch [URL_FILE]`. URLs are read one per line from the file,
//! or from stdin when no file is given.

use std::io::Read;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use reel_media::{
    check_ffmpeg, BrandingAssets, CropDetector, FfmpegRunner, OcrExtractor, PostDownloader,
    ReelRenderer,
};
use reel_models::parse_url_list;
use reel_worker::{
    init_tracing, ApiKeyStore, BatchOptions, BatchProcessor, ChatClient, InstagramSource,
    SettingsStore, TemplateGenerator, TemplateStore, WorkerConfig,
};

fn read_input() -> Result<String> {
    match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {}", path)),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("reading URLs from stdin")?;
            Ok(input)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env();
    info!(?config.output_dir, ?config.temp_dir, ?config.config_dir, "Starting reel-batch");

    check_ffmpeg().context("FFmpeg is required")?;

    let urls = parse_url_list(&read_input()?);
    if urls.is_empty() {
        bail!("No Instagram URLs found in input");
    }

    let settings = SettingsStore::open(&config.config_dir)?.settings().clone();
    let keys = ApiKeyStore::open(&config.config_dir, config.groq_api_key.as_deref())?;
    let templates = Arc::new(Mutex::new(TemplateStore::open(&config.config_dir)?));

    let api_key = match keys.current_key() {
        Some(key) => key.to_string(),
        None => {
            warn!("No API key configured, titles and captions will use fallbacks");
            String::new()
        }
    };
    let generator = TemplateGenerator::new(ChatClient::from_config(&config, api_key), templates);

    let runner = FfmpegRunner::new().with_timeout(config.ffmpeg_timeout_secs);

    let mut downloader = PostDownloader::new();
    if let Some(cookies) = &config.cookies_file {
        downloader = downloader.with_cookies(cookies);
    }
    let source = InstagramSource::new(downloader, OcrExtractor::new(runner.clone()));

    let mut assets = BrandingAssets::from_dir(&config.assets_dir);
    if let Some(font) = &config.font_path {
        assets = assets.with_font(font);
    }
    let renderer = ReelRenderer::new(assets, runner)
        .with_detector(CropDetector::new().with_sample_count(config.crop_samples))
        .with_temp_root(&config.temp_dir);

    let processor = Arc::new(
        BatchProcessor::new(
            Arc::new(source),
            Arc::new(generator),
            Arc::new(renderer),
            &config.output_dir,
            &config.temp_dir,
        )
        .with_progress(Arc::new(|fraction: f64, text: &str| {
            info!(percent = (fraction * 100.0).round(), "{}", text);
        })),
    );

    let options = BatchOptions::new(settings);
    let batch = tokio::spawn({
        let processor = processor.clone();
        async move { processor.process_batch(&urls, &options).await }
    });
    tokio::pin!(batch);

    let result = tokio::select! {
        joined = &mut batch => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, finishing the current step");
            processor.request_stop();
            batch.await
        }
    }
    .context("batch task panicked")?;

    match result {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, batch_fatal = e.is_batch_fatal(), "Batch did not run");
            Err(e.into())
        }
    }
}
