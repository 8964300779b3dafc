//! Volume identity and connection state.

use super::platform::{synthesize_uuid, EjectFailureKind, VolumePlatform};
use crate::core::catalog::{CatalogStore, Volume, VolumeStatus, VolumeType};
use crate::error::VolumeError;
use crate::events::{Event, EventSender, VolumeEvent};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a path lives: its logical mount point and whether that is a
/// real device root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountLocation {
    pub mount_point: PathBuf,
    pub is_device_root: bool,
}

/// Maps paths to stable volumes and keeps their state in sync
pub struct VolumeManager {
    catalog: Arc<dyn CatalogStore>,
    platform: Box<dyn VolumePlatform>,
    events: EventSender,
}

impl VolumeManager {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        platform: Box<dyn VolumePlatform>,
        events: EventSender,
    ) -> Self {
        Self {
            catalog,
            platform,
            events,
        }
    }

    /// Device root for `path`, or the path itself for folders outside one
    pub fn locate(&self, path: &Path) -> MountLocation {
        match self.platform.device_root(path) {
            Some(root) => MountLocation {
                mount_point: root,
                is_device_root: true,
            },
            None => MountLocation {
                mount_point: path.to_path_buf(),
                is_device_root: false,
            },
        }
    }

    fn identify(&self, location: &MountLocation) -> String {
        if location.is_device_root {
            if let Some(uuid) = self.platform.query_uuid(&location.mount_point) {
                return uuid;
            }
            tracing::debug!(
                mount = %location.mount_point.display(),
                "no OS volume id, hashing mount point"
            );
        }
        synthesize_uuid(&location.mount_point)
    }

    /// Volume for an absolute path, created on first use.
    ///
    /// Resolving a known volume marks it connected, unhides it and brings
    /// its offline assets back online.
    pub fn resolve(&self, path: &Path) -> Result<Volume, VolumeError> {
        if !self.platform.is_absolute(path) {
            return Err(VolumeError::RelativePath {
                path: path.to_path_buf(),
            });
        }

        let location = self.locate(path);
        let uuid = self.identify(&location);
        let now = Utc::now();

        let (volume, reconnected) = match self.catalog.get_volume(&uuid)? {
            Some(mut known) => {
                let reconnected = !known.is_connected();
                known.status = VolumeStatus::Connected;
                known.last_mounted_at = Some(now);
                known.hidden = false;
                // Drive letters move between sessions; trust what we see now.
                if known.mount_point.as_deref() != Some(location.mount_point.as_path()) {
                    known.mount_point = Some(location.mount_point.clone());
                }
                (known, reconnected)
            }
            None => {
                let volume = Volume {
                    uuid: uuid.clone(),
                    label: self.platform.label_for(&location.mount_point),
                    mount_point: Some(location.mount_point.clone()),
                    volume_type: self
                        .platform
                        .classify(&location.mount_point, location.is_device_root),
                    status: VolumeStatus::Connected,
                    hidden: false,
                    last_mounted_at: Some(now),
                };
                tracing::info!(
                    uuid = %volume.uuid,
                    label = %volume.label,
                    kind = volume.volume_type.as_str(),
                    "new volume"
                );
                (volume, true)
            }
        };

        let restored = self.catalog.connect_volume(&volume)?;
        if reconnected {
            tracing::info!(uuid = %volume.uuid, restored, "volume connected");
            self.events.send(Event::Volume(VolumeEvent::Connected {
                uuid: volume.uuid.clone(),
                label: volume.label.clone(),
            }));
        }

        Ok(volume)
    }

    /// Mark connected volumes whose mount point vanished as disconnected.
    ///
    /// Returns the uuids that were corrected.
    pub fn reconcile_connections(&self) -> Result<Vec<String>, VolumeError> {
        let mut healed = Vec::new();

        for volume in self.catalog.list_volumes()? {
            if volume.status != VolumeStatus::Connected {
                continue;
            }
            let present = volume
                .mount_point
                .as_deref()
                .map(|m| self.platform.is_mounted(m))
                .unwrap_or(false);
            if present {
                continue;
            }

            let flipped = self.catalog.disconnect_volume(&volume.uuid)?;
            tracing::info!(uuid = %volume.uuid, flipped, "stale connection corrected");
            self.events.send(Event::Volume(VolumeEvent::Disconnected {
                uuid: volume.uuid.clone(),
                label: volume.label.clone(),
            }));
            healed.push(volume.uuid);
        }

        Ok(healed)
    }

    /// All volumes ever seen, after correcting stale connections
    pub fn list_volumes(&self) -> Result<Vec<Volume>, VolumeError> {
        self.reconcile_connections()?;
        Ok(self.catalog.list_volumes()?)
    }

    pub fn get(&self, uuid: &str) -> Result<Volume, VolumeError> {
        self.catalog
            .get_volume(uuid)?
            .ok_or_else(|| VolumeError::NotFound {
                uuid: uuid.to_string(),
            })
    }

    /// Dismount a connected external volume and take its assets offline
    pub fn eject(&self, uuid: &str) -> Result<Volume, VolumeError> {
        let volume = self.get(uuid)?;

        let mount_point = match (&volume.mount_point, volume.status) {
            (Some(mount), VolumeStatus::Connected) => mount.clone(),
            _ => {
                return Err(VolumeError::NotConnected {
                    label: volume.label,
                })
            }
        };
        if volume.volume_type != VolumeType::External {
            return Err(VolumeError::NotEjectable {
                label: volume.label,
            });
        }

        if let Err(failure) = self.platform.eject(&mount_point) {
            tracing::warn!(uuid, detail = %failure.detail, "eject refused");
            let label = volume.label;
            return Err(match failure.kind {
                EjectFailureKind::Busy => VolumeError::Busy { label },
                EjectFailureKind::NotFound => VolumeError::DeviceMissing { label },
                EjectFailureKind::Other => VolumeError::EjectFailed {
                    label,
                    reason: failure.detail,
                },
            });
        }

        let flipped = self.catalog.disconnect_volume(uuid)?;
        tracing::info!(uuid, flipped, "volume ejected");
        self.events.send(Event::Volume(VolumeEvent::Ejected {
            uuid: volume.uuid.clone(),
            label: volume.label.clone(),
        }));

        self.get(uuid)
    }

    /// Hide a volume from listings until it is next resolved
    pub fn hide(&self, uuid: &str) -> Result<Volume, VolumeError> {
        let mut volume = self.get(uuid)?;
        volume.hidden = true;
        self.catalog.save_volume(&volume)?;
        Ok(volume)
    }

    pub fn rename(&self, uuid: &str, label: &str) -> Result<Volume, VolumeError> {
        let mut volume = self.get(uuid)?;
        volume.label = label.trim().to_string();
        self.catalog.save_volume(&volume)?;
        Ok(volume)
    }
}

/// `path` relative to `mount_point`, `/`-separated on every platform
pub fn relative_path(path: &Path, mount_point: &Path) -> Result<String, VolumeError> {
    let relative = path
        .strip_prefix(mount_point)
        .map_err(|_| VolumeError::OutsideMount {
            path: path.to_path_buf(),
            mount_point: mount_point.to_path_buf(),
        })?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
