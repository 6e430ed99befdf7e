//! Branding assets: profile-picture header, logo watermark and title font.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Default assets directory relative to the working directory.
pub const DEFAULT_ASSETS_DIR: &str = "assets";

const PROFILE_PICTURE_FILE: &str = "profpic.jpg";
const LOGO_FILE: &str = "logo.png";
const FONT_FILE: &str = "fonts/font.ttf";

/// Paths to the branding images and the title font.
///
/// ```ignore
/// let assets = BrandingAssets::from_dir("assets")
///     .with_logo("/srv/brand/logo.png");
/// ```
#[derive(Debug, Clone)]
pub struct BrandingAssets {
    pub profile_picture: PathBuf,
    pub logo: PathBuf,
    /// TrueType font for the title; FFmpeg's default font when missing
    pub font: PathBuf,
}

impl Default for BrandingAssets {
    fn default() -> Self {
        Self::from_dir(DEFAULT_ASSETS_DIR)
    }
}

impl BrandingAssets {
    /// Standard layout under one directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            profile_picture: dir.join(PROFILE_PICTURE_FILE),
            logo: dir.join(LOGO_FILE),
            font: dir.join(FONT_FILE),
        }
    }

    pub fn with_profile_picture(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_picture = path.into();
        self
    }

    pub fn with_logo(mut self, path: impl Into<PathBuf>) -> Self {
        self.logo = path.into();
        self
    }

    pub fn with_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.font = path.into();
        self
    }

    /// Font path if the file exists.
    pub fn font_if_available(&self) -> Option<&Path> {
        self.font.exists().then_some(self.font.as_path())
    }

    /// Profile picture dimensions. Missing file is an error: branding cannot proceed without it.
    pub fn profile_picture_dimensions(&self) -> MediaResult<(u32, u32)> {
        if !self.profile_picture.exists() {
            return Err(MediaError::AssetMissing(self.profile_picture.clone()));
        }
        Ok(image::image_dimensions(&self.profile_picture)?)
    }

    /// Logo dimensions, `None` when the logo is absent or unreadable.
    pub fn logo_dimensions(&self) -> Option<(u32, u32)> {
        if !self.logo.exists() {
            return None;
        }
        match image::image_dimensions(&self.logo) {
            Ok(dims) => Some(dims),
            Err(e) => {
                debug!(logo = %self.logo.display(), error = %e, "Logo unreadable");
                None
            }
        }
    }
}

/// Escape a path for use inside a quoted FFmpeg filter option.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}
