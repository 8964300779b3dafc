//! Rendition lookup, regeneration and cache maintenance.

use super::{asset_id_of, MediaUri, RenditionKind, RenditionRenderer, SourceFile, UriTarget};
use crate::core::catalog::{Asset, CatalogStore};
use crate::core::indexer::ContentChangeListener;
use crate::core::scanner::{MediaFilter, MediaType};
use crate::error::RenditionError;
use crate::events::{Event, EventSender, RenditionEvent};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{OnceCell, Semaphore};

type Shared = Result<PathBuf, Arc<RenditionError>>;
type InFlight = Mutex<HashMap<(String, RenditionKind), Arc<OnceCell<Shared>>>>;

/// Files and bytes currently in the cache directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub files: usize,
    pub bytes: u64,
}

/// What a prune pass deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub removed: usize,
    pub bytes_freed: u64,
}

/// Serves renditions from the cache, regenerating on demand
pub struct RenditionManager {
    catalog: Arc<dyn CatalogStore>,
    renderer: Arc<dyn RenditionRenderer>,
    cache_dir: PathBuf,
    permits: Semaphore,
    in_flight: InFlight,
    filter: MediaFilter,
    events: EventSender,
}

impl RenditionManager {
    /// Create the manager, creating `cache_dir` if needed
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        renderer: Arc<dyn RenditionRenderer>,
        cache_dir: impl Into<PathBuf>,
        concurrency: usize,
        events: EventSender,
    ) -> Result<Self, RenditionError> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir).map_err(|e| RenditionError::CacheDirectory {
            path: cache_dir.clone(),
            source: e,
        })?;

        Ok(Self {
            catalog,
            renderer,
            cache_dir,
            permits: Semaphore::new(concurrency.max(1)),
            in_flight: Mutex::new(HashMap::new()),
            filter: MediaFilter::new(),
            events,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn asset(&self, asset_id: &str) -> Result<Asset, RenditionError> {
        self.catalog
            .get_asset(asset_id)?
            .ok_or_else(|| RenditionError::AssetNotFound {
                asset_id: asset_id.to_string(),
            })
    }

    /// Path of the original if its volume is mounted and the file exists
    pub fn original_path(&self, asset: &Asset) -> Result<PathBuf, RenditionError> {
        let mount_point = self
            .catalog
            .get_volume(&asset.volume_id)?
            .filter(|v| v.is_connected())
            .and_then(|v| v.mount_point)
            .ok_or_else(|| RenditionError::VolumeUnmounted {
                asset_id: asset.id.clone(),
            })?;

        let path = asset
            .relative_path
            .split('/')
            .fold(mount_point, |path, part| path.join(part));

        if path.is_file() {
            Ok(path)
        } else {
            Err(RenditionError::OriginalMissing { path })
        }
    }

    fn is_raw(&self, asset: &Asset) -> bool {
        self.filter.is_raw(Path::new(&asset.file_name))
    }

    /// A current-format file already on disk or recorded in the catalog
    fn cached(&self, asset: &Asset, kind: RenditionKind) -> Result<Option<PathBuf>, RenditionError> {
        let on_disk = self.cache_dir.join(kind.file_name(&asset.id));
        if on_disk.is_file() {
            let recorded = match kind {
                RenditionKind::Thumbnail => asset.thumbnail_paths.contains(&on_disk),
                RenditionKind::Preview => asset.preview_path.as_ref() == Some(&on_disk),
            };
            if !recorded {
                self.catalog
                    .set_rendition(&asset.id, kind.slot(), Some(&on_disk))?;
            }
            return Ok(Some(on_disk));
        }

        let usable = |p: &PathBuf| kind.is_current(p) && p.is_file();
        let pointer = match kind {
            RenditionKind::Thumbnail => asset.thumbnail_paths.iter().find(|p| usable(p)).cloned(),
            RenditionKind::Preview => asset.preview_path.clone().filter(usable),
        };
        Ok(pointer)
    }

    /// Path of the requested rendition, regenerating it if needed
    pub async fn get_or_regenerate(
        &self,
        asset_id: &str,
        kind: RenditionKind,
    ) -> Result<PathBuf, RenditionError> {
        let asset = self.asset(asset_id)?;
        match kind {
            RenditionKind::Thumbnail => self.thumbnail_for(&asset).await,
            RenditionKind::Preview => self.preview_for(&asset).await,
        }
    }

    async fn thumbnail_for(&self, asset: &Asset) -> Result<PathBuf, RenditionError> {
        if let Some(path) = self.cached(asset, RenditionKind::Thumbnail)? {
            return Ok(path);
        }
        self.shared_regeneration(asset, RenditionKind::Thumbnail).await
    }

    async fn preview_for(&self, asset: &Asset) -> Result<PathBuf, RenditionError> {
        match asset.media_type {
            MediaType::Video => self.thumbnail_for(asset).await,
            MediaType::Photo if !self.is_raw(asset) => match self.original_path(asset) {
                Ok(path) => Ok(path),
                Err(e) if e.is_not_found() => self.thumbnail_for(asset).await,
                Err(e) => Err(e),
            },
            MediaType::Photo => {
                if let Some(path) = self.cached(asset, RenditionKind::Preview)? {
                    return Ok(path);
                }
                match self.shared_regeneration(asset, RenditionKind::Preview).await {
                    Ok(path) => Ok(path),
                    Err(e) => {
                        tracing::debug!(
                            asset = %asset.id,
                            error = %e,
                            "no RAW preview, using thumbnail"
                        );
                        self.thumbnail_for(asset).await
                    }
                }
            }
        }
    }

    /// Join the in-flight regeneration for this rendition or start one
    async fn shared_regeneration(
        &self,
        asset: &Asset,
        kind: RenditionKind,
    ) -> Result<PathBuf, RenditionError> {
        let key = (asset.id.clone(), kind);
        let cell = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            let cell = in_flight.entry(key.clone()).or_default().clone();
            cell
        };

        let outcome = cell
            .get_or_init(|| async { self.regenerate(asset, kind).await.map_err(Arc::new) })
            .await
            .clone();

        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if in_flight.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                in_flight.remove(&key);
            }
        }

        outcome.map_err(RenditionError::Shared)
    }

    async fn regenerate(&self, asset: &Asset, kind: RenditionKind) -> Result<PathBuf, RenditionError> {
        let result = self.render(asset, kind).await;

        match &result {
            Ok(path) => {
                tracing::debug!(asset = %asset.id, kind = kind.as_str(), "rendition regenerated");
                self.events.send(Event::Rendition(RenditionEvent::Regenerated {
                    asset_id: asset.id.clone(),
                    kind: kind.as_str().to_string(),
                    path: path.clone(),
                }));
            }
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(asset = %asset.id, kind = kind.as_str(), error = %e, "rendition failed");
                }
                self.events.send(Event::Rendition(RenditionEvent::Failed {
                    asset_id: asset.id.clone(),
                    kind: kind.as_str().to_string(),
                    message: e.to_string(),
                }));
            }
        }
        result
    }

    async fn render(&self, asset: &Asset, kind: RenditionKind) -> Result<PathBuf, RenditionError> {
        let dest = self.cache_dir.join(kind.file_name(&asset.id));

        let original = match self.original_path(asset) {
            Ok(path) => path,
            Err(e) => {
                self.clear_stale_pointer(asset, kind);
                return Err(e);
            }
        };
        let source = SourceFile {
            path: original,
            media_type: asset.media_type,
            is_raw: self.is_raw(asset),
            orientation: asset.metadata.orientation,
        };

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| RenditionError::RenderFailed {
                path: source.path.clone(),
                reason: e.to_string(),
            })?;

        // A request queued ahead of ours may have produced it meanwhile.
        if !dest.is_file() {
            let renderer = self.renderer.clone();
            let (blocking_source, blocking_dest) = (source.clone(), dest.clone());
            let produced = tokio::task::spawn_blocking(move || match kind {
                RenditionKind::Thumbnail => renderer
                    .thumbnail(&blocking_source, &blocking_dest)
                    .map(|_| true),
                RenditionKind::Preview => renderer.raw_preview(&blocking_source, &blocking_dest),
            })
            .await
            .map_err(|e| RenditionError::RenderFailed {
                path: source.path.clone(),
                reason: e.to_string(),
            })??;

            if !produced {
                return Err(RenditionError::RenderFailed {
                    path: source.path,
                    reason: "no embedded preview".to_string(),
                });
            }
        }

        self.catalog
            .set_rendition(&asset.id, kind.slot(), Some(&dest))?;
        Ok(dest)
    }

    fn clear_stale_pointer(&self, asset: &Asset, kind: RenditionKind) {
        let has_pointer = match kind {
            RenditionKind::Thumbnail => !asset.thumbnail_paths.is_empty(),
            RenditionKind::Preview => asset.preview_path.is_some(),
        };
        if !has_pointer {
            return;
        }
        if let Err(e) = self.catalog.set_rendition(&asset.id, kind.slot(), None) {
            tracing::warn!(asset = %asset.id, error = %e, "could not clear stale rendition pointer");
        }
    }

    /// File a virtual path resolves to
    pub async fn resolve_uri(&self, uri: &str) -> Result<PathBuf, RenditionError> {
        let uri = MediaUri::parse(uri)?;
        match uri.target {
            UriTarget::Thumbnail => {
                self.get_or_regenerate(&uri.asset_id, RenditionKind::Thumbnail)
                    .await
            }
            UriTarget::Preview => {
                self.get_or_regenerate(&uri.asset_id, RenditionKind::Preview)
                    .await
            }
            UriTarget::Original => {
                let asset = self.asset(&uri.asset_id)?;
                self.original_path(&asset)
            }
        }
    }

    /// Bytes behind a virtual path
    pub async fn read_uri(&self, uri: &str) -> Result<Vec<u8>, RenditionError> {
        let path = self.resolve_uri(uri).await?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| RenditionError::Io { path, source: e })
    }

    fn cache_entries(&self) -> Result<Vec<(PathBuf, String, u64)>, RenditionError> {
        let io_error = |e| RenditionError::Io {
            path: self.cache_dir.clone(),
            source: e,
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if asset_id_of(&name).is_none() {
                continue;
            }
            let metadata = entry.metadata().map_err(io_error)?;
            if metadata.is_file() {
                entries.push((entry.path(), name, metadata.len()));
            }
        }
        Ok(entries)
    }

    pub fn cache_stats(&self) -> Result<CacheStats, RenditionError> {
        let entries = self.cache_entries()?;
        Ok(CacheStats {
            files: entries.len(),
            bytes: entries.iter().map(|(_, _, size)| size).sum(),
        })
    }

    /// Delete the cached renditions of assets whose content changed.
    ///
    /// Returns the number of files removed.
    pub fn invalidate(&self, asset_ids: &[String]) -> usize {
        let mut removed = 0;
        for id in asset_ids {
            for kind in [RenditionKind::Thumbnail, RenditionKind::Preview] {
                let path = self.cache_dir.join(kind.file_name(id));
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "could not drop stale rendition")
                    }
                }
            }
        }
        if removed > 0 {
            tracing::debug!(assets = asset_ids.len(), removed, "stale renditions dropped");
        }
        removed
    }

    /// Delete cache files for assets no longer in the catalog, and files
    /// from superseded format versions
    pub fn prune_orphans(&self) -> Result<PruneReport, RenditionError> {
        let known: HashSet<String> = self.catalog.asset_ids()?.into_iter().collect();
        let mut report = PruneReport::default();

        for (path, name, size) in self.cache_entries()? {
            let orphaned = asset_id_of(&name).is_some_and(|id| !known.contains(id));
            let superseded = !RenditionKind::Thumbnail.is_current(&path)
                && !RenditionKind::Preview.is_current(&path);
            if !orphaned && !superseded {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    report.removed += 1;
                    report.bytes_freed += size;
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not prune cache file"),
            }
        }

        tracing::info!(removed = report.removed, bytes = report.bytes_freed, "rendition cache pruned");
        Ok(report)
    }
}

impl ContentChangeListener for RenditionManager {
    fn content_changed(&self, asset_ids: &[String]) {
        self.invalidate(asset_ids);
    }
}
