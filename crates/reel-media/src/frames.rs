//! Grayscale frame extraction using FFmpeg rawvideo output.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use image::GrayImage;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};

/// Decode the frames at `indices` as 8-bit grayscale.
///
/// Indices may repeat and come in any order; each distinct frame is decoded
/// once in a single FFmpeg pass. Frames past the end of the stream are
/// silently missing from the result.
pub async fn extract_gray_frames(
    video_path: &Path,
    width: u32,
    height: u32,
    indices: &[u64],
) -> MediaResult<BTreeMap<u64, GrayImage>> {
    if indices.is_empty() || width == 0 || height == 0 {
        return Ok(BTreeMap::new());
    }
    check_ffmpeg()?;

    let mut wanted: Vec<u64> = indices.to_vec();
    wanted.sort_unstable();
    wanted.dedup();

    let select = wanted
        .iter()
        .map(|n| format!("eq(n,{})", n))
        .collect::<Vec<_>>()
        .join("+");
    let bytes_per_frame = (width as usize) * (height as usize);

    let mut child = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(video_path)
        .args([
            "-vf",
            &format!("select='{}'", select),
            "-vsync",
            "0",
            "-pix_fmt",
            "gray",
            "-f",
            "rawvideo",
            "-",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None))?;

    let mut buffer = Vec::with_capacity(wanted.len() * bytes_per_frame);
    stdout.read_to_end(&mut buffer).await?;

    let status = child.wait().await?;
    if !status.success() {
        warn!(
            video = %video_path.display(),
            code = ?status.code(),
            "Frame extraction returned non-zero status"
        );
    }

    let decoded = buffer.len() / bytes_per_frame;
    debug!(
        requested = wanted.len(),
        decoded,
        "Extracted grayscale frames"
    );

    // select emits frames in stream order, so the k-th chunk is the k-th wanted index
    let frames = wanted
        .into_iter()
        .zip(buffer.chunks_exact(bytes_per_frame))
        .filter_map(|(index, chunk)| {
            GrayImage::from_raw(width, height, chunk.to_vec()).map(|frame| (index, frame))
        })
        .collect();

    Ok(frames)
}
