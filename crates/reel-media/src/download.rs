//! Instagram post download using yt-dlp.
//!
//! yt-dlp is asked to both download the video and print the post metadata as
//! JSON, so the caption and canonical URL come from the same request.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};
use reel_models::extract_shortcode;

/// A real Netscape cookies file is at least ~50 bytes.
const MIN_COOKIES_FILE_SIZE: u64 = 50;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "m4v"];

/// Media and metadata fetched for one post.
#[derive(Debug, Clone)]
pub struct PostMedia {
    pub video_path: PathBuf,
    pub caption: String,
    pub canonical_url: String,
    pub shortcode: String,
}

/// Subset of the yt-dlp info JSON we rely on.
#[derive(Debug, Deserialize)]
struct PostInfo {
    id: Option<String>,
    description: Option<String>,
    webpage_url: Option<String>,
    vcodec: Option<String>,
}

/// Downloads Instagram posts.
#[derive(Debug, Clone)]
pub struct PostDownloader {
    cookies: Option<PathBuf>,
    timeout: Duration,
}

impl Default for PostDownloader {
    fn default() -> Self {
        Self {
            cookies: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl PostDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authenticate with a Netscape cookies file. Invalid files are ignored at download time.
    pub fn with_cookies(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Download the post at `url` into `work_dir`.
    pub async fn download(&self, url: &str, work_dir: &Path) -> MediaResult<PostMedia> {
        let shortcode = extract_shortcode(url).map_err(|e| MediaError::InvalidUrl(e.to_string()))?;
        check_ytdlp()?;
        tokio::fs::create_dir_all(work_dir).await?;

        let template = work_dir.join(format!("reel_{}.%(ext)s", shortcode));
        let template_str = template.to_string_lossy().into_owned();

        let mut args: Vec<String> = [
            "--no-playlist",
            "--no-simulate",
            "--dump-json",
            "--no-progress",
            "--no-warnings",
            "-f",
            "best[ext=mp4]/bestvideo+bestaudio/best",
            "--merge-output-format",
            "mp4",
            "-o",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(template_str);

        if let Some(cookies) = self.writable_cookies(work_dir).await {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
        args.push(url.to_string());

        info!(url = %url, shortcode = %shortcode, "Downloading post");

        let child = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| MediaError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(classify_failure(url, &stderr));
        }

        let info = parse_info(&output.stdout)?;
        if info.vcodec.as_deref() == Some("none") {
            return Err(MediaError::NotAVideo(url.to_string()));
        }

        let video_path = find_downloaded_video(work_dir, &shortcode)
            .await?
            .ok_or_else(|| MediaError::download_failed("Output file not created"))?;

        let size = tokio::fs::metadata(&video_path).await?.len();
        info!(
            output = %video_path.display(),
            size_mb = size as f64 / (1024.0 * 1024.0),
            "Downloaded post"
        );

        Ok(PostMedia {
            video_path,
            caption: info.description.unwrap_or_default().trim().to_string(),
            canonical_url: info.webpage_url.unwrap_or_else(|| url.to_string()),
            shortcode: info.id.unwrap_or(shortcode),
        })
    }

    /// Copy the configured cookies next to the download, since yt-dlp writes
    /// them back after use. Returns `None` when no usable file is configured.
    async fn writable_cookies(&self, work_dir: &Path) -> Option<PathBuf> {
        let source = self.cookies.as_ref()?;

        let metadata = match tokio::fs::metadata(source).await {
            Ok(m) => m,
            Err(e) => {
                warn!(cookies = %source.display(), error = %e, "Cookies file unreadable, downloading without it");
                return None;
            }
        };
        if metadata.len() < MIN_COOKIES_FILE_SIZE {
            debug!(cookies = %source.display(), size = metadata.len(), "Cookies file too small, skipping");
            return None;
        }

        match tokio::fs::read_to_string(source).await {
            Ok(content) if is_valid_netscape_cookies(&content) => {}
            Ok(_) => {
                warn!(cookies = %source.display(), "Cookies file is not in Netscape format, skipping");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read cookies file");
                return None;
            }
        }

        let copy = work_dir.join("cookies.txt");
        match tokio::fs::copy(source, &copy).await {
            Ok(_) => Some(copy),
            Err(e) => {
                warn!(error = %e, "Failed to copy cookies file");
                None
            }
        }
    }
}

/// Netscape cookies files start with a known header or hold tab-separated
/// lines of at least six fields.
fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File") || content.starts_with("# HTTP Cookie File") {
        return true;
    }

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| line.split('\t').count() >= 6)
}

/// Map yt-dlp's stderr to a typed error.
fn classify_failure(url: &str, stderr: &str) -> MediaError {
    let lower = stderr.to_lowercase();

    if lower.contains("login required")
        || lower.contains("log in")
        || lower.contains("login_required")
        || lower.contains("private")
    {
        return MediaError::LoginRequired(url.to_string());
    }

    if lower.contains("no video formats found")
        || lower.contains("there is no video in this post")
        || lower.contains("requested format is not available")
    {
        return MediaError::NotAVideo(url.to_string());
    }

    let last = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("Unknown error");
    MediaError::download_failed(format!("yt-dlp failed: {}", last.trim()))
}

/// First JSON object line of `--dump-json` output.
fn parse_info(stdout: &[u8]) -> MediaResult<PostInfo> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .find(|l| l.trim_start().starts_with('{'))
        .ok_or_else(|| MediaError::download_failed("yt-dlp printed no metadata"))?;
    Ok(serde_json::from_str(line)?)
}

async fn find_downloaded_video(work_dir: &Path, shortcode: &str) -> MediaResult<Option<PathBuf>> {
    let prefix = format!("reel_{}.", shortcode);
    let mut entries = tokio::fs::read_dir(work_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(ext) = name.strip_prefix(&prefix) else {
            continue;
        };
        if VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return Ok(Some(entry.path()));
        }
    }

    Ok(None)
}
