//! Collaborators the batch processor drives, one per pipeline stage.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{WorkerError, WorkerResult};
use reel_media::{MediaError, OcrExtractor, PostDownloader, ReelOptions, ReelRenderer, RenderReport};
use reel_models::DownloadedPost;

/// Fetches a post's video, caption and on-screen text.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, url: &str, work_dir: &Path) -> WorkerResult<DownloadedPost>;
}

/// Produces titles and captions.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_title(
        &self,
        original_caption: &str,
        ocr_text: &str,
        template_id: Option<&str>,
    ) -> WorkerResult<String>;

    async fn generate_caption(
        &self,
        original_caption: &str,
        ocr_text: &str,
        title: &str,
        template_id: Option<&str>,
    ) -> WorkerResult<String>;
}

/// Turns a source video into a finished reel at `output`.
#[async_trait]
pub trait VideoProducer: Send + Sync {
    async fn produce(
        &self,
        source: &Path,
        title: &str,
        output: &Path,
        options: &ReelOptions,
    ) -> WorkerResult<RenderReport>;
}

/// Instagram posts through yt-dlp, with OCR over the downloaded video.
#[derive(Debug, Clone)]
pub struct InstagramSource {
    downloader: PostDownloader,
    ocr: OcrExtractor,
}

impl InstagramSource {
    pub fn new(downloader: PostDownloader, ocr: OcrExtractor) -> Self {
        Self { downloader, ocr }
    }
}

#[async_trait]
impl ContentSource for InstagramSource {
    async fn fetch(&self, url: &str, work_dir: &Path) -> WorkerResult<DownloadedPost> {
        let media = self
            .downloader
            .download(url, work_dir)
            .await
            .map_err(download_error)?;

        let ocr = self.ocr.extract(&media.video_path, work_dir).await;

        Ok(DownloadedPost {
            video_path: media.video_path,
            original_caption: media.caption,
            ocr,
            canonical_url: media.canonical_url,
            shortcode: media.shortcode,
        })
    }
}

fn download_error(e: MediaError) -> WorkerError {
    match e {
        MediaError::InvalidUrl(msg) => WorkerError::download_failed(format!("Invalid URL: {}", msg)),
        MediaError::LoginRequired(url) => {
            WorkerError::download_failed(format!("Login required to access {}", url))
        }
        MediaError::NotAVideo(url) => WorkerError::download_failed(format!("Post is not a video: {}", url)),
        other => WorkerError::download_failed(other.to_string()),
    }
}

#[async_trait]
impl VideoProducer for ReelRenderer {
    async fn produce(
        &self,
        source: &Path,
        title: &str,
        output: &Path,
        options: &ReelOptions,
    ) -> WorkerResult<RenderReport> {
        self.render(source, title, output, options)
            .await
            .map_err(|e| WorkerError::render_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_messages() {
        let err = download_error(MediaError::LoginRequired("https://www.instagram.com/p/x/".into()));
        assert_eq!(
            err.to_string(),
            "Download failed: Login required to access https://www.instagram.com/p/x/"
        );
        assert!(matches!(
            download_error(MediaError::YtDlpNotFound),
            WorkerError::DownloadFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let source = InstagramSource::new(PostDownloader::new(), OcrExtractor::default());

        let err = source.fetch("https://example.com/clip", dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid URL"));
    }
}
