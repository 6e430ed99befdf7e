//! Instagram URL parsing.

use thiserror::Error;
use url::Url;

/// Path segments that precede a post shortcode.
const POST_KINDS: &[&str] = &["reel", "reels", "p", "tv"];

/// Errors that can occur during shortcode extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortcodeError {
    #[error("URL is not a valid Instagram URL")]
    InvalidInstagramUrl,

    #[error("Shortcode not found in URL")]
    ShortcodeNotFound,

    #[error("Shortcode has invalid format")]
    InvalidShortcode,
}

/// Whether a line mentions an Instagram host.
pub fn is_instagram_url(line: &str) -> bool {
    let line = line.to_ascii_lowercase();
    line.contains("instagram.com") || line.contains("instagr.am")
}

/// Extract the post shortcode from a reel, post or IGTV URL.
///
/// Accepts `https://www.instagram.com/reel/<code>/`, `/reels/`, `/p/` and
/// `/tv/` forms, with or without query strings.
pub fn extract_shortcode(raw: &str) -> Result<String, ShortcodeError> {
    let url = Url::parse(raw.trim()).map_err(|_| ShortcodeError::InvalidInstagramUrl)?;

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let is_instagram = host == "instagram.com"
        || host.ends_with(".instagram.com")
        || host == "instagr.am"
        || host.ends_with(".instagr.am");
    if !is_instagram || !matches!(url.scheme(), "http" | "https") {
        return Err(ShortcodeError::InvalidInstagramUrl);
    }

    let mut segments = url
        .path_segments()
        .ok_or(ShortcodeError::ShortcodeNotFound)?
        .filter(|s| !s.is_empty());

    let code = loop {
        match segments.next() {
            Some(kind) if POST_KINDS.contains(&kind) => {
                break segments.next().ok_or(ShortcodeError::ShortcodeNotFound)?;
            }
            Some(_) => continue,
            None => return Err(ShortcodeError::ShortcodeNotFound),
        }
    };

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ShortcodeError::InvalidShortcode);
    }

    Ok(code.to_string())
}

/// Split pasted text into Instagram URLs, one per line.
///
/// Blank lines and lines without an Instagram host are dropped.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && is_instagram_url(line))
        .map(str::to_string)
        .collect()
}
