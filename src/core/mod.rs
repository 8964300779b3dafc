//! # Core Module
//!
//! The UI-agnostic cataloging engine.
//!
//! ## Modules
//! - `scanner` - Discovers photo and video files in directories
//! - `fingerprint` - Cheap partial-content hashes
//! - `metadata` - Best-effort technical metadata (EXIF, ffprobe)
//! - `catalog` - Persists assets and volumes
//! - `volume` - Stable identity for mount points and drives
//! - `indexer` - Background indexing runs with pause/resume/cancel
//! - `rendition` - Thumbnail and preview cache
//! - `library` - Facade wiring the above together

pub mod catalog;
pub mod fingerprint;
pub mod indexer;
pub mod library;
pub mod metadata;
pub mod rendition;
pub mod scanner;
pub mod volume;

// Re-export commonly used types
pub use catalog::{Asset, AssetStatus, Volume, VolumeStatus, VolumeType};
pub use library::{MediaLibrary, MediaLibraryBuilder};
pub use metadata::MediaMetadata;
pub use rendition::{MediaUri, RenditionKind};
pub use scanner::MediaType;
