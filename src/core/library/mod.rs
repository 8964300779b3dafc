//! # Library Module
//!
//! `MediaLibrary` wires the catalog, volume manager, indexer and rendition
//! cache together behind one handle. It is the surface a UI or the CLI
//! talks to.
//!
//! ## Example
//! ```rust,ignore
//! use media_catalog::{EngineConfig, MediaLibrary};
//!
//! let library = MediaLibrary::open(EngineConfig::default())?;
//! library.start_indexing("/Volumes/EOS_DIGITAL/DCIM".as_ref())?;
//! let summary = library.wait_for_indexing();
//! ```

use crate::config::EngineConfig;
use crate::core::catalog::{Asset, CatalogStore, SqliteCatalog, Volume};
use crate::core::indexer::{
    self, FlushPolicy, IndexOrchestrator, IndexWorker, MediaIndexWorker, WorkerJob,
};
use crate::core::metadata::{MetadataExtractor, ToolExtractor};
use crate::core::rendition::{
    CacheStats, PruneReport, RenditionKind, RenditionManager, RenditionRenderer, ToolRenderer,
};
use crate::core::scanner::{MediaScanner, WalkDirScanner};
use crate::core::volume::{current_platform, VolumeManager, VolumePlatform};
use crate::error::{Result, VolumeError};
use crate::events::{EventSender, IndexProgress, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builder for [`MediaLibrary`]; every collaborator can be swapped
pub struct MediaLibraryBuilder {
    config: EngineConfig,
    events: EventSender,
    catalog: Option<Arc<dyn CatalogStore>>,
    platform: Option<Box<dyn VolumePlatform>>,
    scanner: Option<Arc<dyn MediaScanner>>,
    extractor: Option<Arc<dyn MetadataExtractor>>,
    worker: Option<Arc<dyn IndexWorker>>,
    renderer: Option<Arc<dyn RenditionRenderer>>,
}

impl MediaLibraryBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            events: EventSender::detached(),
            catalog: None,
            platform: None,
            scanner: None,
            extractor: None,
            worker: None,
            renderer: None,
        }
    }

    /// Publish engine events on this sender
    pub fn events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    /// Use this catalog instead of opening `config.catalog_path`
    pub fn catalog(mut self, catalog: Arc<dyn CatalogStore>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn platform(mut self, platform: Box<dyn VolumePlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn scanner(mut self, scanner: Arc<dyn MediaScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Replace the background worker (defaults to scan + extract)
    pub fn worker(mut self, worker: Arc<dyn IndexWorker>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn RenditionRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn build(self) -> Result<MediaLibrary> {
        let config = self.config;
        config.validate()?;

        let catalog: Arc<dyn CatalogStore> = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(SqliteCatalog::open(&config.catalog_path)?),
        };
        let scanner: Arc<dyn MediaScanner> = match self.scanner {
            Some(scanner) => scanner,
            None => Arc::new(WalkDirScanner::new()),
        };
        let extractor: Arc<dyn MetadataExtractor> = match self.extractor {
            Some(extractor) => extractor,
            None => Arc::new(ToolExtractor::new(
                config.ffprobe.clone(),
                config.photo_timeout(),
            )),
        };
        let worker: Arc<dyn IndexWorker> = match self.worker {
            Some(worker) => worker,
            None => Arc::new(MediaIndexWorker::new(scanner.clone(), extractor.clone())),
        };
        let renderer: Arc<dyn RenditionRenderer> = match self.renderer {
            Some(renderer) => renderer,
            None => Arc::new(ToolRenderer::new(
                config.ffmpeg.clone(),
                config.exiftool.clone(),
                config.thumbnail_edge,
            )),
        };
        let platform = self.platform.unwrap_or_else(current_platform);
        tracing::debug!(platform = platform.name(), "volume platform selected");

        let volumes = VolumeManager::new(catalog.clone(), platform, self.events.clone());
        let renditions = Arc::new(RenditionManager::new(
            catalog.clone(),
            renderer,
            config.rendition_dir.clone(),
            config.rendition_concurrency,
            self.events.clone(),
        )?);
        let indexer = IndexOrchestrator::new(
            catalog.clone(),
            worker,
            self.events.clone(),
            FlushPolicy {
                interval: config.flush_interval(),
                threshold: config.flush_threshold,
            },
        )
        .with_listener(renditions.clone());

        Ok(MediaLibrary {
            config,
            catalog,
            scanner,
            extractor,
            volumes,
            indexer,
            renditions,
        })
    }
}

/// The cataloging engine
pub struct MediaLibrary {
    config: EngineConfig,
    catalog: Arc<dyn CatalogStore>,
    scanner: Arc<dyn MediaScanner>,
    extractor: Arc<dyn MetadataExtractor>,
    volumes: VolumeManager,
    indexer: IndexOrchestrator,
    renditions: Arc<RenditionManager>,
}

impl MediaLibrary {
    pub fn builder(config: EngineConfig) -> MediaLibraryBuilder {
        MediaLibraryBuilder::new(config)
    }

    /// Open with default collaborators
    pub fn open(config: EngineConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn CatalogStore {
        self.catalog.as_ref()
    }

    pub fn renditions(&self) -> &RenditionManager {
        &self.renditions
    }

    // Scanning and indexing

    /// Media files under `path`, without touching the catalog
    pub fn scan_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.scanner.scan(path)?)
    }

    /// Index one file and upsert it into the catalog
    pub fn index_file(&self, path: &Path, volume_id: &str, mount_point: &Path) -> Result<Asset> {
        let asset = indexer::index_file(path, volume_id, mount_point, self.extractor.as_ref())?;
        let report = self.catalog.upsert_assets(std::slice::from_ref(&asset))?;
        self.renditions.invalidate(&report.content_changed);
        Ok(asset)
    }

    /// Resolve the volume for `path` and index it in the background
    pub fn start_indexing(&self, path: &Path) -> Result<Volume> {
        let volume = self.volumes.resolve(path)?;
        let mount_point = volume
            .mount_point
            .clone()
            .ok_or_else(|| VolumeError::NotConnected {
                label: volume.label.clone(),
            })?;

        self.indexer.start(WorkerJob {
            root: path.to_path_buf(),
            volume_id: volume.uuid.clone(),
            mount_point,
        })?;
        Ok(volume)
    }

    pub fn pause_indexing(&self, path: &Path) -> Result<()> {
        Ok(self.indexer.pause(path)?)
    }

    pub fn resume_indexing(&self, path: &Path) -> Result<()> {
        Ok(self.indexer.resume(path)?)
    }

    pub fn cancel_indexing(&self, path: &Path) -> Result<()> {
        Ok(self.indexer.cancel(path)?)
    }

    pub fn indexing_progress(&self, path: &Path) -> Option<IndexProgress> {
        self.indexer.progress(path)
    }

    /// Block until the active run ends
    pub fn wait_for_indexing(&self) -> Option<RunSummary> {
        self.indexer.wait()
    }

    /// Groups of assets that are probably the same file
    pub fn duplicate_candidates(&self) -> Result<Vec<Vec<Asset>>> {
        Ok(self.catalog.duplicate_candidates()?)
    }

    // Volumes

    pub fn resolve_volume_for_path(&self, path: &Path) -> Result<Volume> {
        Ok(self.volumes.resolve(path)?)
    }

    pub fn list_volumes(&self) -> Result<Vec<Volume>> {
        Ok(self.volumes.list_volumes()?)
    }

    pub fn eject(&self, uuid: &str) -> Result<Volume> {
        Ok(self.volumes.eject(uuid)?)
    }

    pub fn hide(&self, uuid: &str) -> Result<Volume> {
        Ok(self.volumes.hide(uuid)?)
    }

    pub fn rename(&self, uuid: &str, label: &str) -> Result<Volume> {
        Ok(self.volumes.rename(uuid, label)?)
    }

    // Renditions

    pub async fn rendition(&self, asset_id: &str, kind: RenditionKind) -> Result<PathBuf> {
        Ok(self.renditions.get_or_regenerate(asset_id, kind).await?)
    }

    /// Bytes behind a `media://` virtual path
    pub async fn read_uri(&self, uri: &str) -> Result<Vec<u8>> {
        Ok(self.renditions.read_uri(uri).await?)
    }

    pub fn prune_cache(&self) -> Result<PruneReport> {
        Ok(self.renditions.prune_orphans()?)
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        Ok(self.renditions.cache_stats()?)
    }
}

impl std::fmt::Debug for MediaLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaLibrary")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{AssetStatus, VolumeStatus};
    use crate::core::volume::EjectFailure;
    use crate::error::CatalogEngineError;
    use crate::events::{EventChannel, RunStatus};
    use std::fs;
    use tempfile::TempDir;

    /// Every path is its own local volume; nothing is ejectable
    struct FolderPlatform;

    impl VolumePlatform for FolderPlatform {
        fn name(&self) -> &'static str {
            "folders"
        }

        fn device_root(&self, _path: &Path) -> Option<PathBuf> {
            None
        }

        fn query_uuid(&self, _device_root: &Path) -> Option<String> {
            None
        }

        fn eject(&self, _device_root: &Path) -> std::result::Result<(), EjectFailure> {
            Err(EjectFailure::classify("not supported"))
        }
    }

    fn library(temp_dir: &TempDir) -> MediaLibrary {
        let config = EngineConfig {
            ffprobe: "ffprobe-not-installed".to_string(),
            ..EngineConfig::rooted_at(&temp_dir.path().join("state"))
        };
        MediaLibrary::builder(config)
            .platform(Box::new(FolderPlatform))
            .build()
            .unwrap()
    }

    #[test]
    fn index_then_reindex_upserts() {
        let temp_dir = TempDir::new().unwrap();
        let photos = temp_dir.path().join("photos");
        fs::create_dir_all(photos.join("trip")).unwrap();
        fs::write(photos.join("a.jpg"), b"a").unwrap();
        fs::write(photos.join("trip/b.mp4"), b"b").unwrap();
        let library = library(&temp_dir);

        for _ in 0..2 {
            library.start_indexing(&photos).unwrap();
            let summary = library.wait_for_indexing().unwrap();
            assert_eq!(summary.status, RunStatus::Completed);
            assert_eq!(summary.indexed, 2);
        }
        assert_eq!(library.catalog().count_assets().unwrap(), 2);
    }

    #[test]
    fn deleted_files_become_missing_on_rescan() {
        let temp_dir = TempDir::new().unwrap();
        let photos = temp_dir.path().join("photos");
        fs::create_dir_all(&photos).unwrap();
        fs::write(photos.join("a.jpg"), b"a").unwrap();
        fs::write(photos.join("b.jpg"), b"b").unwrap();
        let library = library(&temp_dir);

        let volume = library.start_indexing(&photos).unwrap();
        library.wait_for_indexing().unwrap();
        fs::remove_file(photos.join("b.jpg")).unwrap();
        library.start_indexing(&photos).unwrap();
        let summary = library.wait_for_indexing().unwrap();

        assert_eq!(summary.missing, 1);
        let b = library
            .catalog()
            .get_asset(&crate::core::catalog::asset_id(&volume.uuid, "b.jpg"))
            .unwrap()
            .unwrap();
        assert_eq!(b.status, AssetStatus::Missing);
    }

    #[test]
    fn index_file_persists_a_single_asset() {
        let temp_dir = TempDir::new().unwrap();
        let photos = temp_dir.path().join("photos");
        fs::create_dir_all(&photos).unwrap();
        fs::write(photos.join("a.png"), b"png-ish").unwrap();
        let library = library(&temp_dir);

        let volume = library.resolve_volume_for_path(&photos).unwrap();
        let asset = library
            .index_file(&photos.join("a.png"), &volume.uuid, &photos)
            .unwrap();

        assert_eq!(asset.relative_path, "a.png");
        let stored = library.catalog().get_asset(&asset.id).unwrap().unwrap();
        assert_eq!(stored.fingerprint, asset.fingerprint);
        assert_eq!(stored.volume_id, volume.uuid);
    }

    #[test]
    fn volumes_round_trip_through_the_facade() {
        let temp_dir = TempDir::new().unwrap();
        let photos = temp_dir.path().join("photos");
        fs::create_dir_all(&photos).unwrap();
        let (sender, receiver) = EventChannel::new();
        let config = EngineConfig::rooted_at(&temp_dir.path().join("state"));
        let library = MediaLibrary::builder(config)
            .platform(Box::new(FolderPlatform))
            .events(sender)
            .build()
            .unwrap();

        let volume = library.resolve_volume_for_path(&photos).unwrap();
        library.rename(&volume.uuid, "Photos").unwrap();
        library.hide(&volume.uuid).unwrap();

        let listed = library.list_volumes().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].label, "Photos");
        assert!(listed[0].hidden);
        assert_eq!(listed[0].status, VolumeStatus::Connected);
        assert!(matches!(
            library.eject(&volume.uuid),
            Err(CatalogEngineError::Volume(VolumeError::NotEjectable { .. }))
        ));
        assert!(!receiver.drain().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig {
            rendition_concurrency: 0,
            ..EngineConfig::rooted_at(temp_dir.path())
        };
        assert!(matches!(
            MediaLibrary::open(config),
            Err(CatalogEngineError::Config(_))
        ));
    }
}
