//! Title rasterization: white outlined text on a transparent PNG.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::assets::escape_filter_path;
use super::layout::{title_height, TITLE_FONT_SIZE, TITLE_LINE_SPACING, TITLE_VERTICAL_PADDING};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

const OUTLINE_WIDTH: u32 = 2;

/// A wrapped title ready to be drawn.
#[derive(Debug, Clone)]
pub struct TitleImage {
    pub lines: Vec<String>,
    pub width: u32,
    pub font_size: u32,
}

impl TitleImage {
    pub fn new(lines: Vec<String>, width: u32) -> Self {
        Self {
            lines,
            width,
            font_size: TITLE_FONT_SIZE,
        }
    }

    pub fn height(&self) -> u32 {
        title_height(self.lines.len(), self.font_size)
    }

    /// One `drawtext` per line, centered horizontally, reading text from files.
    fn filter(&self, line_files: &[PathBuf], font: Option<&Path>) -> String {
        let line_height = self.font_size + TITLE_LINE_SPACING;
        let font_opt = font
            .map(|f| format!(":fontfile='{}'", escape_filter_path(f)))
            .unwrap_or_default();

        let mut chain = vec!["format=rgba".to_string()];
        for (i, file) in line_files.iter().enumerate() {
            let y = TITLE_VERTICAL_PADDING + i as u32 * line_height;
            chain.push(format!(
                "drawtext=textfile='{}'{}:expansion=none:fontsize={}:fontcolor=white:borderw={}:bordercolor=black:x=(w-text_w)/2:y={}",
                escape_filter_path(file),
                font_opt,
                self.font_size,
                OUTLINE_WIDTH,
                y
            ));
        }
        chain.join(",")
    }

    /// Render to `<dir>/title.png`. Line text goes through files so titles
    /// never need filter-syntax escaping.
    pub async fn render(
        &self,
        dir: &Path,
        font: Option<&Path>,
        runner: &FfmpegRunner,
    ) -> MediaResult<PathBuf> {
        let mut line_files = Vec::with_capacity(self.lines.len());
        for (i, line) in self.lines.iter().enumerate() {
            let path = dir.join(format!("title_line_{}.txt", i));
            tokio::fs::write(&path, line).await?;
            line_files.push(path);
        }

        let output = dir.join("title.png");
        let source = format!("color=c=black@0.0:s={}x{}:d=1", self.width, self.height());
        let cmd = FfmpegCommand::lavfi(source, &output)
            .video_filter(self.filter(&line_files, font))
            .single_frame();

        debug!(lines = self.lines.len(), output = %output.display(), "Rendering title image");
        runner.run(&cmd).await?;
        Ok(output)
    }
}
