//! Overlay compositor.
//!
//! Builds the final 1080x1920 reel: black canvas, the video scaled to the
//! canvas width, an optional title (with an optional profile-picture header
//! above it) and an optional logo near the bottom.

pub mod assets;
pub mod layout;
pub mod title;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;
use reel_models::{EncodingConfig, RenderPlan, CANVAS_HEIGHT, CANVAS_WIDTH};

pub use assets::BrandingAssets;
pub use layout::{plan_layout, wrap_title, LayoutInput};
pub use title::TitleImage;

/// Per-render switches.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Stack the profile picture above the title
    pub add_branding: bool,
    pub add_logo: bool,
    pub encoding: EncodingConfig,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            add_branding: true,
            add_logo: true,
            encoding: EncodingConfig::default(),
        }
    }
}

/// Image inputs that accompany the video, in FFmpeg input order after `0`.
#[derive(Debug, Clone, Default)]
struct OverlayInputs {
    header: Option<PathBuf>,
    title: Option<PathBuf>,
    logo: Option<PathBuf>,
}

/// Composites reels with FFmpeg.
#[derive(Debug, Clone)]
pub struct Compositor {
    assets: BrandingAssets,
    runner: FfmpegRunner,
}

impl Compositor {
    pub fn new(assets: BrandingAssets, runner: FfmpegRunner) -> Self {
        Self { assets, runner }
    }

    pub fn assets(&self) -> &BrandingAssets {
        &self.assets
    }

    /// Render `video` with `title` into `output`.
    ///
    /// `work_dir` receives the title image and its line files; the caller
    /// owns its cleanup.
    pub async fn render(
        &self,
        video: &Path,
        title: &str,
        output: &Path,
        work_dir: &Path,
        options: &RenderOptions,
    ) -> MediaResult<RenderPlan> {
        let info = probe_video(video).await?;

        let max_chars = layout::max_chars_per_line(layout::title_width(), layout::TITLE_FONT_SIZE);
        let lines = if title.trim().is_empty() {
            Vec::new()
        } else {
            wrap_title(title.trim(), max_chars)
        };

        let scaled_h = layout::scaled_height(info.width, info.height, CANVAS_WIDTH);
        let title_visible = !lines.is_empty() && !layout::is_tall_video(scaled_h);
        if !lines.is_empty() && !title_visible {
            info!(scaled_height = scaled_h, "Tall video, skipping title");
        }

        // The header only accompanies a visible title
        let header = if options.add_branding && title_visible {
            Some(self.assets.profile_picture_dimensions()?)
        } else {
            None
        };

        let logo = if options.add_logo {
            let dims = self.assets.logo_dimensions();
            if dims.is_none() {
                warn!(logo = %self.assets.logo.display(), "Logo enabled but not found, rendering without it");
            }
            dims
        } else {
            None
        };

        let plan = plan_layout(&LayoutInput {
            video: (info.width, info.height),
            title_lines: lines.len(),
            header,
            logo,
        });

        let title_png = match plan.title {
            Some(region) => Some(
                TitleImage::new(lines, region.width)
                    .render(work_dir, self.assets.font_if_available(), &self.runner)
                    .await?,
            ),
            None => None,
        };

        let inputs = OverlayInputs {
            header: plan.header.map(|_| self.assets.profile_picture.clone()),
            title: title_png,
            logo: plan.logo.map(|_| self.assets.logo.clone()),
        };

        let mut cmd = FfmpegCommand::new(video, output);
        for path in [&inputs.header, &inputs.title, &inputs.logo].into_iter().flatten() {
            cmd = cmd.add_input(path);
        }
        let encoding = options.encoding.clone().with_fps(info.fps);
        cmd = cmd
            .filter_complex(build_filter_graph(&plan, &inputs, info.fps))
            .map("[vout]")
            .map("0:a?")
            .encoding(&encoding, info.has_audio);

        debug!(?plan, "Compositing reel");
        self.runner
            .run_with_progress(&cmd, {
                let duration = info.duration;
                move |progress| {
                    if progress.is_complete || progress.frame % 300 == 0 {
                        debug!(percent = progress.fraction(duration) * 100.0, "Render progress");
                    }
                }
            })
            .await?;

        ensure_rendered(output)?;

        info!(output = %output.display(), "Reel rendered");
        Ok(plan)
    }
}

/// The output is reserved as an empty file before rendering, so an empty
/// file means FFmpeg wrote nothing.
fn ensure_rendered(output: &Path) -> MediaResult<()> {
    match std::fs::metadata(output) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(MediaError::ffmpeg_failed("Render produced no output", None, None)),
    }
}

/// FFmpeg filter graph for a plan. Input 0 is the video; image inputs follow
/// in header, title, logo order for whichever are present.
fn build_filter_graph(plan: &RenderPlan, inputs: &OverlayInputs, fps: f64) -> String {
    let mut chains = vec![
        format!(
            "color=c=black:s={}x{}:r={:.3}[bg]",
            CANVAS_WIDTH, CANVAS_HEIGHT, fps
        ),
        format!(
            "[0:v]scale={}:{},setsar=1[vid]",
            plan.video.width, plan.video.height
        ),
        format!(
            "[bg][vid]overlay=x={}:y={}:shortest=1[base0]",
            plan.video.x, plan.video.y
        ),
    ];

    let mut next_input = 1;
    let mut base = 0;

    let mut overlay = |chains: &mut Vec<String>, prep: String, x: u32, y: u32| {
        chains.push(format!("[{}:v]{}[ov{}]", next_input, prep, next_input));
        chains.push(format!(
            "[base{}][ov{}]overlay=x={}:y={}[base{}]",
            base,
            next_input,
            x,
            y,
            base + 1
        ));
        next_input += 1;
        base += 1;
    };

    if let (Some(region), Some(_)) = (plan.header, &inputs.header) {
        overlay(
            &mut chains,
            format!("scale={}:{}", region.width, region.height),
            region.x,
            region.y,
        );
    }
    if let (Some(region), Some(_)) = (plan.title, &inputs.title) {
        overlay(&mut chains, "format=rgba".to_string(), region.x, region.y);
    }
    if let (Some(region), Some(_)) = (plan.logo, &inputs.logo) {
        overlay(
            &mut chains,
            format!("scale={}:{},format=rgba", region.width, region.height),
            region.x,
            region.y,
        );
    }

    let last = chains.pop().unwrap_or_default();
    chains.push(replace_last_label(&last, "[vout]"));
    chains.join(";")
}

/// Swap the trailing `[label]` of a filter chain.
fn replace_last_label(chain: &str, label: &str) -> String {
    match chain.rfind('[') {
        Some(pos) => format!("{}{}", &chain[..pos], label),
        None => format!("{}{}", chain, label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_for(input: LayoutInput) -> RenderPlan {
        plan_layout(&input)
    }

    #[test]
    fn test_filter_graph_video_only() {
        let plan = plan_for(LayoutInput {
            video: (1080, 1080),
            ..Default::default()
        });
        let graph = build_filter_graph(&plan, &OverlayInputs::default(), 30.0);

        assert!(graph.starts_with("color=c=black:s=1080x1920:r=30.000[bg]"));
        assert!(graph.contains("[0:v]scale=1080:1080,setsar=1[vid]"));
        assert!(graph.ends_with("[bg][vid]overlay=x=0:y=420:shortest=1[vout]"));
    }

    #[test]
    fn test_filter_graph_layers_in_order() {
        let plan = plan_for(LayoutInput {
            video: (1920, 1080),
            title_lines: 1,
            header: Some((1080, 200)),
            logo: Some((450, 200)),
        });
        let inputs = OverlayInputs {
            header: Some(PathBuf::from("profpic.jpg")),
            title: Some(PathBuf::from("title.png")),
            logo: Some(PathBuf::from("logo.png")),
        };
        let graph = build_filter_graph(&plan, &inputs, 25.0);

        let header = graph.find("[1:v]scale=1080:200").unwrap();
        let title = graph.find("[2:v]format=rgba").unwrap();
        let logo = graph.find("[3:v]scale=225:100").unwrap();
        assert!(header < title && title < logo);
        assert!(graph.contains("overlay=x=427:y=1536[vout]"));
        assert_eq!(graph.matches("[vout]").count(), 1);
    }

    #[test]
    fn test_filter_graph_without_header() {
        let plan = plan_for(LayoutInput {
            video: (1920, 1080),
            title_lines: 2,
            header: None,
            logo: None,
        });
        let inputs = OverlayInputs {
            title: Some(PathBuf::from("title.png")),
            ..Default::default()
        };
        let graph = build_filter_graph(&plan, &inputs, 30.0);

        let title = plan.title.unwrap();
        assert!(graph.contains("[1:v]format=rgba[ov1]"));
        assert!(graph.ends_with(&format!("[base1][ov1]overlay=x=54:y={}[vout]", title.y)));
    }

    #[test]
    fn test_empty_reservation_is_not_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("5-1.mp4");

        assert!(ensure_rendered(&output).is_err());
        std::fs::write(&output, b"").unwrap();
        assert!(ensure_rendered(&output).is_err());
        std::fs::write(&output, b"mp4 data").unwrap();
        assert!(ensure_rendered(&output).is_ok());
    }

    #[test]
    fn test_replace_last_label() {
        assert_eq!(replace_last_label("[a][b]overlay[base2]", "[vout]"), "[a][b]overlay[vout]");
    }
}
