//! File classification for the scanner.

use super::MediaType;
use std::collections::HashSet;
use std::path::Path;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "avi", "mkv", "mts", "m2ts", "3gp", "webm", "wmv", "mpg", "mpeg", "mxf",
];

const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "heic", "heif", "avif",
];

/// Camera RAW containers. Photos, but previewed from their embedded JPEG.
const RAW_EXTENSIONS: &[&str] = &[
    "dng", "cr2", "cr3", "nef", "nrw", "arw", "srf", "sr2", "orf", "rw2", "raf", "pef", "srw",
    "x3f", "3fr", "iiq", "erf", "kdc", "mrw",
];

/// Classifies files by extension and hides dot-files
pub struct MediaFilter {
    video: HashSet<&'static str>,
    photo: HashSet<&'static str>,
    raw: HashSet<&'static str>,
}

impl MediaFilter {
    /// Create a filter with the built-in extension sets
    pub fn new() -> Self {
        Self {
            video: VIDEO_EXTENSIONS.iter().copied().collect(),
            photo: PHOTO_EXTENSIONS.iter().copied().collect(),
            raw: RAW_EXTENSIONS.iter().copied().collect(),
        }
    }

    /// Entries starting with `.` are skipped; this covers `._` resource forks.
    pub fn is_hidden(name: &str) -> bool {
        name.starts_with('.')
    }

    /// Classify a path by its extension, case-insensitively
    pub fn classify(&self, path: &Path) -> Option<MediaType> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if self.video.contains(ext.as_str()) {
            Some(MediaType::Video)
        } else if self.photo.contains(ext.as_str()) || self.raw.contains(ext.as_str()) {
            Some(MediaType::Photo)
        } else {
            None
        }
    }

    /// Whether the path is a camera RAW container
    pub fn is_raw(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.raw.contains(e.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Check if a file should be included in a scan
    pub fn should_include(&self, path: &Path) -> bool {
        let visible = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| !Self::is_hidden(n))
            .unwrap_or(false);

        visible && self.classify(path).is_some()
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self::new()
    }
}
