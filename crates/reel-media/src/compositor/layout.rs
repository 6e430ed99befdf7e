//! Layer placement on the 1080x1920 canvas.
//!
//! Layout is computed up front from dimensions alone so it can be checked
//! without touching FFmpeg.

use reel_models::{Region, RenderPlan, CANVAS_HEIGHT, CANVAS_WIDTH};

/// Title text width as a fraction of the canvas width.
pub const TITLE_WIDTH_RATIO: f64 = 0.9;
pub const TITLE_FONT_SIZE: u32 = 60;
/// Line height is the font size plus this spacing.
pub const TITLE_LINE_SPACING: u32 = 10;
/// Transparent padding above and below the title lines.
pub const TITLE_VERTICAL_PADDING: u32 = 20;
/// Gap between the profile-picture header and the title.
pub const HEADER_TITLE_GAP: u32 = 10;
/// Gap between the header/title block and the video.
pub const BLOCK_VIDEO_GAP: u32 = 50;
/// Smallest distance from the canvas top to the first layer.
pub const MIN_TOP_MARGIN: u32 = 80;
/// Scaled videos taller than this fraction of the canvas get no title.
pub const TALL_VIDEO_RATIO: f64 = 0.70;
pub const LOGO_WIDTH: u32 = 225;
/// Logo top edge as a fraction of the canvas height.
pub const LOGO_TOP_RATIO: f64 = 0.8;

/// Width of the title image.
pub fn title_width() -> u32 {
    (f64::from(CANVAS_WIDTH) * TITLE_WIDTH_RATIO) as u32
}

/// Characters per title line, estimated from an average glyph of half the font size.
pub fn max_chars_per_line(width: u32, font_size: u32) -> usize {
    (width / (font_size / 2).max(1)).max(1) as usize
}

/// Word-wrap a title.
///
/// Existing line breaks are kept. A single word longer than the limit gets
/// a line of its own rather than being split.
pub fn wrap_title(text: &str, max_chars: usize) -> Vec<String> {
    let mut wrapped = Vec::new();

    for line in text.split('\n') {
        if line.chars().count() <= max_chars {
            wrapped.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            let candidate = current.chars().count() + 1 + word.chars().count();
            if candidate <= max_chars {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            } else {
                if !current.is_empty() {
                    wrapped.push(std::mem::take(&mut current));
                }
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            wrapped.push(current);
        }
    }

    wrapped
}

/// Pixel height of a title image holding `line_count` lines.
pub fn title_height(line_count: usize, font_size: u32) -> u32 {
    line_count as u32 * (font_size + TITLE_LINE_SPACING) + 2 * TITLE_VERTICAL_PADDING
}

/// Height after scaling to `target_width`, preserving aspect and rounded down to even.
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    let scaled = (u64::from(height) * u64::from(target_width) / u64::from(width)) as u32;
    (scaled & !1).max(2)
}

/// Whether a video of this scaled height leaves no room for a title.
pub fn is_tall_video(scaled_height: u32) -> bool {
    f64::from(scaled_height) > f64::from(CANVAS_HEIGHT) * TALL_VIDEO_RATIO
}

/// Dimensions feeding the layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutInput {
    /// Source video (width, height)
    pub video: (u32, u32),
    /// Number of wrapped title lines, 0 for no title
    pub title_lines: usize,
    /// Profile picture (width, height) when branding is on
    pub header: Option<(u32, u32)>,
    /// Logo (width, height) when a logo is available
    pub logo: Option<(u32, u32)>,
}

/// Place every layer.
///
/// The header only exists together with a title. Tall videos drop both.
pub fn plan_layout(input: &LayoutInput) -> RenderPlan {
    let (src_w, src_h) = input.video;
    let video_h = scaled_height(src_w, src_h, CANVAS_WIDTH);
    let title_suppressed = input.title_lines > 0 && is_tall_video(video_h);
    let show_title = input.title_lines > 0 && !title_suppressed;

    let title_size = show_title.then(|| (title_width(), title_height(input.title_lines, TITLE_FONT_SIZE)));
    let header_h = match (show_title, input.header) {
        (true, Some((w, h))) => Some(scaled_height(w, h, CANVAS_WIDTH)),
        _ => None,
    };

    let block_h = match (header_h, title_size) {
        (Some(hh), Some((_, th))) => Some(hh + HEADER_TITLE_GAP + th),
        (None, Some((_, th))) => Some(th),
        _ => None,
    };

    let total_h = video_h + block_h.map(|h| h + BLOCK_VIDEO_GAP).unwrap_or(0);
    let start_y = (CANVAS_HEIGHT.saturating_sub(total_h) / 2).max(MIN_TOP_MARGIN);

    let mut y = start_y;
    let header = header_h.map(|h| Region::new(0, y, CANVAS_WIDTH, h));
    if let Some(header) = header {
        y = header.bottom() + HEADER_TITLE_GAP;
    }
    let title = title_size.map(|(w, h)| Region::new((CANVAS_WIDTH - w) / 2, y, w, h));
    if let Some(block_h) = block_h {
        y = start_y + block_h + BLOCK_VIDEO_GAP;
    }

    let video = Region::new(0, y, CANVAS_WIDTH, video_h);

    let logo = input.logo.map(|(w, h)| {
        let logo_h = scaled_height(w, h, LOGO_WIDTH);
        Region::new(
            (CANVAS_WIDTH - LOGO_WIDTH) / 2,
            (f64::from(CANVAS_HEIGHT) * LOGO_TOP_RATIO) as u32,
            LOGO_WIDTH,
            logo_h,
        )
    });

    RenderPlan {
        canvas: Region::new(0, 0, CANVAS_WIDTH, CANVAS_HEIGHT),
        video,
        header,
        title,
        logo,
        title_suppressed,
    }
}
