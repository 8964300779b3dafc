//! Single-file indexing: classify, fingerprint, extract.

use crate::core::catalog::{asset_id, Asset, AssetStatus};
use crate::core::fingerprint::fingerprint;
use crate::core::metadata::MetadataExtractor;
use crate::core::scanner::MediaFilter;
use crate::core::volume::relative_path;
use crate::error::IndexError;
use chrono::Utc;
use std::path::Path;

/// Build the catalog record for one file on a resolved volume.
///
/// Hashing and metadata failures degrade into a fallback fingerprint and
/// empty metadata; only a missing or unsupported file is an error.
pub fn index_file(
    path: &Path,
    volume_id: &str,
    mount_point: &Path,
    extractor: &dyn MetadataExtractor,
) -> Result<Asset, IndexError> {
    if !path.is_file() {
        return Err(IndexError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let media_type = MediaFilter::new()
        .classify(path)
        .ok_or_else(|| IndexError::Unsupported {
            path: path.to_path_buf(),
        })?;

    let relative = relative_path(path, mount_point)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative.clone());

    let fingerprint = fingerprint(path);
    let metadata = extractor.extract(path, media_type);
    tracing::debug!(
        path = %path.display(),
        kind = fingerprint.kind.as_str(),
        has_metadata = metadata.has_data(),
        "indexed file"
    );

    Ok(Asset {
        id: asset_id(volume_id, &relative),
        volume_id: volume_id.to_string(),
        relative_path: relative,
        file_name,
        media_type,
        fingerprint,
        metadata,
        thumbnail_paths: Vec::new(),
        preview_path: None,
        waveform_path: None,
        proxy_path: None,
        status: AssetStatus::Online,
        indexed_at: Utc::now(),
    })
}
