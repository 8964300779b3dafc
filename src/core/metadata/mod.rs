//! # Metadata Module
//!
//! Best-effort technical metadata for one media file.
//!
//! Extraction never fails: a missing tool, corrupt file or timeout yields an
//! all-`None` [`MediaMetadata`], and indexing carries on. `None` means "not
//! extracted yet", so a later re-index can backfill it.
//!
//! ## Sources
//! - Photos: EXIF via kamadak-exif, bounded by a timeout
//! - Videos: stream info via `ffprobe` (no timeout)

mod photo;
mod video;

pub use photo::extract_photo_metadata;
pub use video::{parse_frame_rate, probe_video_metadata};

use crate::core::scanner::MediaType;
use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Technical metadata, all fields optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    /// Displayed width in pixels (after orientation)
    pub width: Option<u32>,
    /// Displayed height in pixels (after orientation)
    pub height: Option<u32>,
    /// Video codec name (e.g., "h264", "hevc")
    pub codec: Option<String>,
    /// Frames per second; `Some(0.0)` when the prober's rate was unparseable
    pub frame_rate: Option<f64>,
    /// Duration in seconds
    pub duration: Option<f64>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub iso: Option<u32>,
    pub f_number: Option<f64>,
    /// Exposure time in seconds
    pub exposure_time: Option<f64>,
    /// Focal length in millimetres
    pub focal_length: Option<f64>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    /// EXIF orientation (1-8, where 1 is normal)
    pub orientation: Option<u16>,
    /// Original capture date/time
    pub date_taken: Option<DateTime<Utc>>,
}

impl MediaMetadata {
    /// Check if any metadata was extracted
    pub fn has_data(&self) -> bool {
        *self != MediaMetadata::default()
    }
}

/// Trait for metadata sources
///
/// Implementations must not fail: degrade to `MediaMetadata::default()`.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path, media_type: MediaType) -> MediaMetadata;
}

/// Extractor backed by kamadak-exif and ffprobe
#[derive(Debug, Clone)]
pub struct ToolExtractor {
    ffprobe: String,
    photo_timeout: Duration,
}

impl ToolExtractor {
    pub fn new(ffprobe: impl Into<String>, photo_timeout: Duration) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            photo_timeout,
        }
    }

    fn extract_photo_bounded(&self, path: &Path) -> MediaMetadata {
        let (sender, receiver) = bounded(1);
        let owned: PathBuf = path.to_path_buf();

        // A stuck read leaves this thread behind; the run itself moves on.
        let spawned = std::thread::Builder::new()
            .name("exif-reader".to_string())
            .spawn(move || {
                let _ = sender.send(extract_photo_metadata(&owned));
            });

        if let Err(e) = spawned {
            tracing::warn!(error = %e, "could not spawn EXIF reader");
            return MediaMetadata::default();
        }

        match receiver.recv_timeout(self.photo_timeout) {
            Ok(metadata) => metadata,
            Err(_) => {
                tracing::warn!(path = %path.display(), "photo metadata timed out");
                MediaMetadata::default()
            }
        }
    }
}

impl MetadataExtractor for ToolExtractor {
    fn extract(&self, path: &Path, media_type: MediaType) -> MediaMetadata {
        match media_type {
            MediaType::Photo => self.extract_photo_bounded(path),
            MediaType::Video => probe_video_metadata(&self.ffprobe, path),
        }
    }
}
