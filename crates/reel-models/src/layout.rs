//! Final-frame layout types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output canvas width in pixels.
pub const CANVAS_WIDTH: u32 = 1080;
/// Output canvas height in pixels.
pub const CANVAS_HEIGHT: u32 = 1920;

/// A placed rectangle on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// First row below this region.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Placement of every layer in a rendered reel.
///
/// Layers are composited in field order: canvas, video, header, title, logo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderPlan {
    pub canvas: Region,
    pub video: Region,
    /// Profile-picture banner above the title
    pub header: Option<Region>,
    pub title: Option<Region>,
    pub logo: Option<Region>,
    /// Title and header dropped because the scaled video is too tall
    pub title_suppressed: bool,
}

impl RenderPlan {
    /// Region enclosing the header and title block, if either is present.
    pub fn top_block(&self) -> Option<Region> {
        match (self.header, self.title) {
            (Some(header), Some(title)) => Some(Region::new(
                0,
                header.y,
                CANVAS_WIDTH,
                title.bottom() - header.y,
            )),
            (Some(header), None) => Some(header),
            (None, Some(title)) => Some(title),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_block_spans_header_and_title() {
        let plan = RenderPlan {
            canvas: Region::new(0, 0, CANVAS_WIDTH, CANVAS_HEIGHT),
            video: Region::new(0, 700, 1080, 608),
            header: Some(Region::new(0, 300, 1080, 200)),
            title: Some(Region::new(54, 510, 972, 180)),
            logo: None,
            title_suppressed: false,
        };

        let block = plan.top_block().unwrap();
        assert_eq!(block.y, 300);
        assert_eq!(block.bottom(), 690);
    }
}
