//! # Catalog Module
//!
//! The `assets` and `volumes` tables this engine owns, and the store that
//! persists them.
//!
//! ## Backends
//! - `SqliteCatalog` - one SQLite connection, one transaction per batch

mod sqlite;
mod traits;

pub use sqlite::SqliteCatalog;
pub use traits::CatalogStore;

use crate::core::fingerprint::Fingerprint;
use crate::core::metadata::MediaMetadata;
use crate::core::scanner::MediaType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Namespace for asset ids derived from `"{volume}:{relative path}"`
const ASSET_NAMESPACE: Uuid = Uuid::from_u128(0x6d65_6469_612d_6361_7461_6c6f_672d_6964);

/// Deterministic 36-character asset id
pub fn asset_id(volume_id: &str, relative_path: &str) -> String {
    let key = format!("{}:{}", volume_id, relative_path);
    Uuid::new_v5(&ASSET_NAMESPACE, key.as_bytes()).to_string()
}

/// Lifecycle state of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    /// Volume mounted and file present
    Online,
    /// Volume not mounted
    Offline,
    /// File confirmed gone while the volume was mounted
    Missing,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Online => "online",
            AssetStatus::Offline => "offline",
            AssetStatus::Missing => "missing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "online" => Some(AssetStatus::Online),
            "offline" => Some(AssetStatus::Offline),
            "missing" => Some(AssetStatus::Missing),
            _ => None,
        }
    }
}

/// One catalog row per indexed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub volume_id: String,
    /// `/`-separated path relative to the volume's mount point
    pub relative_path: String,
    pub file_name: String,
    pub media_type: MediaType,
    pub fingerprint: Fingerprint,
    pub metadata: MediaMetadata,
    pub thumbnail_paths: Vec<PathBuf>,
    pub preview_path: Option<PathBuf>,
    pub waveform_path: Option<PathBuf>,
    pub proxy_path: Option<PathBuf>,
    pub status: AssetStatus,
    pub indexed_at: DateTime<Utc>,
}

/// Result of a batch upsert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Rows inserted or updated
    pub written: usize,
    /// Existing assets whose size or partial hash changed
    pub content_changed: Vec<String>,
}

/// How a volume is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    Local,
    External,
    Network,
}

impl VolumeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeType::Local => "local",
            VolumeType::External => "external",
            VolumeType::Network => "network",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(VolumeType::Local),
            "external" => Some(VolumeType::External),
            "network" => Some(VolumeType::Network),
            _ => None,
        }
    }
}

/// Whether a volume is currently reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeStatus {
    Connected,
    Disconnected,
}

impl VolumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeStatus::Connected => "connected",
            VolumeStatus::Disconnected => "disconnected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "connected" => Some(VolumeStatus::Connected),
            "disconnected" => Some(VolumeStatus::Disconnected),
            _ => None,
        }
    }
}

/// A logical storage location, stable across mount cycles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub uuid: String,
    pub label: String,
    /// `None` while disconnected
    pub mount_point: Option<PathBuf>,
    pub volume_type: VolumeType,
    pub status: VolumeStatus,
    pub hidden: bool,
    pub last_mounted_at: Option<DateTime<Utc>>,
}

impl Volume {
    pub fn is_connected(&self) -> bool {
        self.status == VolumeStatus::Connected && self.mount_point.is_some()
    }
}

/// Which rendition pointer on an asset to update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenditionSlot {
    Thumbnail,
    Preview,
    Waveform,
    Proxy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_id_is_stable_and_36_chars() {
        let a = asset_id("V", "x/y.jpg");
        let b = asset_id("V", "x/y.jpg");
        assert_eq!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn asset_id_hashes_volume_and_path_together() {
        let key = format!("{}:{}", "V", "x/y.jpg");
        let expected = Uuid::new_v5(&ASSET_NAMESPACE, key.as_bytes()).to_string();
        assert_eq!(asset_id("V", "x/y.jpg"), expected);
    }

    #[test]
    fn same_relative_path_on_other_volume_differs() {
        assert_ne!(asset_id("V1", "DCIM/a.jpg"), asset_id("V2", "DCIM/a.jpg"));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [AssetStatus::Online, AssetStatus::Offline, AssetStatus::Missing] {
            assert_eq!(AssetStatus::parse(status.as_str()), Some(status));
        }
        for kind in [VolumeType::Local, VolumeType::External, VolumeType::Network] {
            assert_eq!(VolumeType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(VolumeStatus::parse("connected"), Some(VolumeStatus::Connected));
        assert_eq!(AssetStatus::parse("deleted"), None);
    }
}
