//! # Rendition Module
//!
//! Lazily populated cache of thumbnails and previews, served through
//! `media://` virtual paths.
//!
//! ## Cache layout
//! One flat directory, one file per asset, kind and format version:
//! - `<asset id>_thumb_v2.jpg`
//! - `<asset id>_preview_v1.jpg`
//!
//! Files from older pipelines (`<asset id>_thumb.jpg`) are never served.
//!
//! ## Concurrency
//! Concurrent requests for the same rendition share one regeneration;
//! distinct regenerations are bounded by a FIFO semaphore.

mod embedded;
mod manager;
mod render;
mod uri;

pub use embedded::{extract_embedded_preview, scan_for_largest_jpeg, PREVIEW_TAGS};
pub use manager::{CacheStats, PruneReport, RenditionManager};
pub use render::{fit_dimensions, fit_within, RenditionRenderer, SourceFile, ToolRenderer};
pub use uri::{MediaUri, UriTarget};

use crate::core::catalog::RenditionSlot;
use std::path::Path;

/// Renditions the cache produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenditionKind {
    Thumbnail,
    Preview,
}

impl RenditionKind {
    /// File name suffix of the current format version
    pub fn suffix(&self) -> &'static str {
        match self {
            RenditionKind::Thumbnail => "_thumb_v2.jpg",
            RenditionKind::Preview => "_preview_v1.jpg",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenditionKind::Thumbnail => "thumbnail",
            RenditionKind::Preview => "preview",
        }
    }

    pub fn slot(&self) -> RenditionSlot {
        match self {
            RenditionKind::Thumbnail => RenditionSlot::Thumbnail,
            RenditionKind::Preview => RenditionSlot::Preview,
        }
    }

    /// Cache file name for an asset
    pub fn file_name(&self, asset_id: &str) -> String {
        format!("{}{}", asset_id, self.suffix())
    }

    /// Whether `path` names a file of the current format version
    pub fn is_current(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(self.suffix()))
    }
}

/// Asset id encoded in a cache file name, for any format version
pub fn asset_id_of(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(".jpg")?;
    let (id, kind) = stem.split_once('_')?;
    (kind.starts_with("thumb") || kind.starts_with("preview")).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_carry_format_version() {
        assert_eq!(RenditionKind::Thumbnail.file_name("abc"), "abc_thumb_v2.jpg");
        assert_eq!(RenditionKind::Preview.file_name("abc"), "abc_preview_v1.jpg");
    }

    #[test]
    fn legacy_thumbnails_are_not_current() {
        let kind = RenditionKind::Thumbnail;
        assert!(kind.is_current(Path::new("/cache/abc_thumb_v2.jpg")));
        assert!(!kind.is_current(Path::new("/cache/abc_thumb.jpg")));
        assert!(!kind.is_current(Path::new("/cache/abc_preview_v1.jpg")));
    }

    #[test]
    fn asset_ids_are_recovered_from_file_names() {
        assert_eq!(asset_id_of("a-b-c_thumb_v2.jpg"), Some("a-b-c"));
        assert_eq!(asset_id_of("a-b-c_thumb.jpg"), Some("a-b-c"));
        assert_eq!(asset_id_of("a-b-c_preview_v1.jpg"), Some("a-b-c"));
        assert_eq!(asset_id_of(".tmpX1y2"), None);
        assert_eq!(asset_id_of("notes.txt"), None);
    }
}
