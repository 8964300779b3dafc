//! # Error Module
//!
//! User-friendly error types for the media catalog engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Item-scoped failures degrade**, operation-scoped failures propagate
//! - **Include context** - paths, volume ids, what went wrong
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug)]
pub enum CatalogEngineError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Volume error: {0}")]
    Volume(#[from] VolumeError),

    #[error("Indexing error: {0}")]
    Index(#[from] IndexError),

    #[error("Rendition error: {0}")]
    Rendition(#[from] RenditionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that occur while walking a directory tree
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the catalog store
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to open catalog database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Catalog lock poisoned at {path}. Restart the application.")]
    Poisoned { path: PathBuf },

    #[error("Unknown {column} value in catalog: {value}")]
    InvalidValue { column: &'static str, value: String },
}

impl From<rusqlite::Error> for CatalogError {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            // Row decoding wraps our own errors; hand them back unchanged.
            rusqlite::Error::FromSqlConversionFailure(_, _, source) => {
                match source.downcast::<CatalogError>() {
                    Ok(inner) => *inner,
                    Err(other) => CatalogError::QueryFailed(other.to_string()),
                }
            }
            other => CatalogError::QueryFailed(other.to_string()),
        }
    }
}

/// Errors from volume resolution and management
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("Volume not found: {uuid}")]
    NotFound { uuid: String },

    #[error("Volume {label} is not connected")]
    NotConnected { label: String },

    #[error("Volume {label} is not an external drive and cannot be ejected")]
    NotEjectable { label: String },

    #[error("Volume {label} is in use. Close any files or apps using it and try again.")]
    Busy { label: String },

    #[error("Volume {label} could not be found by the system. It may already be ejected.")]
    DeviceMissing { label: String },

    #[error("Failed to eject {label}: {reason}")]
    EjectFailed { label: String, reason: String },

    #[error("Path is not absolute: {path}")]
    RelativePath { path: PathBuf },

    #[error("Path {path} is not under mount point {mount_point}")]
    OutsideMount { path: PathBuf, mount_point: PathBuf },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors from one-shot or orchestrated indexing
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported media file: {path}")]
    Unsupported { path: PathBuf },

    #[error("No indexing run active for {path}")]
    NoActiveRun { path: PathBuf },

    #[error("Indexing worker failed: {0}")]
    WorkerFailed(String),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors from the rendition cache
#[derive(Error, Debug)]
pub enum RenditionError {
    #[error("Invalid media URI: {uri}")]
    InvalidUri { uri: String },

    #[error("Asset not found: {asset_id}")]
    AssetNotFound { asset_id: String },

    #[error("Original unavailable for {asset_id}: volume is not mounted")]
    VolumeUnmounted { asset_id: String },

    #[error("Original file is gone: {path}")]
    OriginalMissing { path: PathBuf },

    #[error("Failed to render {path}: {reason}")]
    RenderFailed { path: PathBuf, reason: String },

    #[error("Failed to create rendition cache directory {path}: {source}")]
    CacheDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Failure of a regeneration other requests were waiting on
    #[error(transparent)]
    Shared(Arc<RenditionError>),
}

impl RenditionError {
    /// Whether this error means "nothing to show" rather than a broken pipeline
    pub fn is_not_found(&self) -> bool {
        match self {
            RenditionError::Shared(inner) => inner.is_not_found(),
            other => matches!(
                other,
                RenditionError::AssetNotFound { .. }
                    | RenditionError::VolumeUnmounted { .. }
                    | RenditionError::OriginalMissing { .. }
            ),
        }
    }
}

/// Errors loading engine configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CatalogEngineError>;
