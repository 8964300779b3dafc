//! # Scanner Module
//!
//! Discovers photo and video files in directory trees.
//!
//! ## Rules
//! - Depth-first, always recursing into subdirectories
//! - Names starting with `.` (including `._` AppleDouble files) are skipped
//! - Extensions are matched case-insensitively against fixed video/photo sets
//! - An unreadable directory fails the scan; partial results are never returned
//!
//! ## Example
//! ```rust,ignore
//! use media_catalog::core::scanner::{MediaScanner, WalkDirScanner};
//!
//! let files = WalkDirScanner::new().scan("/Volumes/Card".as_ref())?;
//! ```

mod filter;
mod walker;

pub use filter::MediaFilter;
pub use walker::WalkDirScanner;

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Broad media category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Photo => "photo",
            MediaType::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "photo" => Some(MediaType::Photo),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }
}

/// Trait for directory scanners
///
/// Implement this trait to substitute a scanner in tests.
pub trait MediaScanner: Send + Sync {
    /// Recursively collect recognized media files under `root`
    fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError>;
}
