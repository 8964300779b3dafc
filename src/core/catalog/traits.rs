//! Catalog store trait definition.

use super::{Asset, AssetStatus, RenditionSlot, UpsertReport, Volume};
use crate::error::CatalogError;
use std::path::Path;

/// Trait for catalog backends
///
/// Compound operations (`connect_volume`, `disconnect_volume`,
/// `upsert_assets`) must be atomic.
pub trait CatalogStore: Send + Sync {
    /// Insert or update assets in a single transaction.
    ///
    /// Rows are keyed by `(volume_id, relative_path)`. Rendition pointers
    /// survive an upsert unless the fingerprint changed; those ids are
    /// listed in the report so their cached renditions can be dropped.
    fn upsert_assets(&self, assets: &[Asset]) -> Result<UpsertReport, CatalogError>;

    fn get_asset(&self, id: &str) -> Result<Option<Asset>, CatalogError>;

    /// Assets on a volume whose relative path starts with `prefix`
    /// (empty prefix = the whole volume)
    fn assets_under(&self, volume_id: &str, prefix: &str) -> Result<Vec<Asset>, CatalogError>;

    fn asset_ids(&self) -> Result<Vec<String>, CatalogError>;

    fn count_assets(&self) -> Result<usize, CatalogError>;

    /// Set the status of the given assets; returns rows changed
    fn set_asset_status(&self, ids: &[String], status: AssetStatus)
        -> Result<usize, CatalogError>;

    /// Point a rendition slot at a file, or clear it with `None`
    fn set_rendition(
        &self,
        id: &str,
        slot: RenditionSlot,
        path: Option<&Path>,
    ) -> Result<(), CatalogError>;

    /// Groups of assets sharing size and a content partial hash
    fn duplicate_candidates(&self) -> Result<Vec<Vec<Asset>>, CatalogError>;

    fn get_volume(&self, uuid: &str) -> Result<Option<Volume>, CatalogError>;

    fn list_volumes(&self) -> Result<Vec<Volume>, CatalogError>;

    /// Insert or replace a volume row
    fn save_volume(&self, volume: &Volume) -> Result<(), CatalogError>;

    /// Save a connected volume and flip its offline assets online.
    /// Returns the number of assets flipped.
    fn connect_volume(&self, volume: &Volume) -> Result<usize, CatalogError>;

    /// Clear the mount point, mark disconnected, flip non-missing assets
    /// offline. Returns the number of assets flipped.
    fn disconnect_volume(&self, uuid: &str) -> Result<usize, CatalogError>;
}
