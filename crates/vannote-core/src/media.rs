//! Media Helpers
//!
//! Platform URL parsing, local content hashing and playback-time formatting.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::CoreResult;
use crate::types::TimeSec;

/// Prefix carried by every local content hash
pub const HASH_PREFIX: &str = "sha256:";

static YOUTUBE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .expect("valid youtube url regex")
});

static BARE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid video id regex"));

static SEEK_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]t=(\d+)").expect("valid seek regex"));

// =============================================================================
// Platform References
// =============================================================================

/// Canonical watch URL for a platform id
pub fn youtube_watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Extracts the 11-character platform id from a URL or bare id.
pub fn extract_youtube_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_ID_RE.is_match(input) {
        return Some(input.to_string());
    }
    YOUTUBE_URL_RE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// =============================================================================
// Local Files
// =============================================================================

/// Content hash of a local file as `sha256:<hex>`
pub fn hash_file(path: &Path) -> CoreResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{HASH_PREFIX}{:x}", hasher.finalize()))
}

/// `file://` URL for a local path
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

// =============================================================================
// Playback Time
// =============================================================================

/// Parses a seek target: a `t=<seconds>` URL parameter, or plain
/// non-negative whole seconds.
pub fn parse_seek_input(input: &str) -> Option<u64> {
    if let Some(caps) = SEEK_PARAM_RE.captures(input) {
        return caps.get(1).and_then(|m| m.as_str().parse().ok());
    }
    input.trim().parse::<u64>().ok()
}

/// Formats seconds as `m:ss`, or `h:mm:ss` past the hour
pub fn format_timestamp(seconds: TimeSec) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
