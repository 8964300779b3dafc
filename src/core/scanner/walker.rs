//! Directory walking implementation using walkdir.

use super::{filter::MediaFilter, MediaScanner};
use crate::error::ScanError;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Depth-first scanner built on the walkdir crate
///
/// Entries are visited in file-name order so repeated scans of an
/// unchanged tree produce identical results.
pub struct WalkDirScanner {
    filter: MediaFilter,
}

impl WalkDirScanner {
    pub fn new() -> Self {
        Self {
            filter: MediaFilter::new(),
        }
    }

    fn is_visible(entry: &DirEntry) -> bool {
        // The root is always walked, even if it is itself a dot-directory.
        entry.depth() == 0
            || entry
                .file_name()
                .to_str()
                .map(|name| !MediaFilter::is_hidden(name))
                .unwrap_or(true)
    }

    fn convert_error(error: walkdir::Error, root: &Path) -> ScanError {
        let path = error
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());

        match error.into_io_error() {
            Some(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                ScanError::PermissionDenied { path }
            }
            Some(io) if io.kind() == std::io::ErrorKind::NotFound => {
                ScanError::DirectoryNotFound { path }
            }
            Some(io) => ScanError::ReadDirectory { path, source: io },
            None => ScanError::ReadDirectory {
                path,
                source: std::io::Error::other("filesystem loop detected"),
            },
        }
    }
}

impl Default for WalkDirScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaScanner for WalkDirScanner {
    fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut found = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(Self::is_visible);

        for entry in walker {
            // An unreadable directory fails the whole scan rather than
            // silently dropping a subtree.
            let entry = entry.map_err(|e| Self::convert_error(e, root))?;

            if entry.file_type().is_file() && self.filter.should_include(entry.path()) {
                found.push(entry.into_path());
            }
        }

        tracing::debug!(root = %root.display(), files = found.len(), "scan finished");
        Ok(found)
    }
}
