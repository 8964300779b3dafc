//! Linux: desktop automounts under `/media`, `/run/media` and `/mnt`.

use super::platform::{EjectFailure, EjectFailureKind, VolumePlatform};
use std::path::{Component, Path, PathBuf};
use std::process::Command;

pub struct LinuxPlatform;

impl LinuxPlatform {
    pub fn new() -> Self {
        Self
    }

    fn normal_components(path: &Path) -> Option<Vec<&std::ffi::OsStr>> {
        let mut components = path.components();
        if components.next() != Some(Component::RootDir) {
            return None;
        }
        components
            .map(|c| match c {
                Component::Normal(name) => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumePlatform for LinuxPlatform {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn device_root(&self, path: &Path) -> Option<PathBuf> {
        let parts = Self::normal_components(path)?;
        let depth = match parts.first()?.to_str()? {
            // /media/<user>/<label>
            "media" => 3,
            // /run/media/<user>/<label>
            "run" if parts.get(1).and_then(|p| p.to_str()) == Some("media") => 4,
            // /mnt/<label>
            "mnt" => 2,
            _ => return None,
        };

        if parts.len() < depth {
            return None;
        }
        let mut root = PathBuf::from("/");
        root.extend(&parts[..depth]);
        Some(root)
    }

    fn query_uuid(&self, device_root: &Path) -> Option<String> {
        findmnt(device_root, "UUID")
    }

    fn eject(&self, device_root: &Path) -> Result<(), EjectFailure> {
        // udisks unmounts user automounts without root; plain umount covers
        // fstab mounts and systems without udisks.
        if let Some(device) = findmnt(device_root, "SOURCE") {
            if let Ok(output) = Command::new("udisksctl")
                .args(["unmount", "--no-user-interaction", "--block-device", &device])
                .output()
            {
                if output.status.success() {
                    return Ok(());
                }
                let failure = EjectFailure::from_output(&output);
                if failure.kind == EjectFailureKind::Busy {
                    return Err(failure);
                }
                tracing::debug!(detail = %failure.detail, "udisksctl failed, trying umount");
            }
        }

        let output = Command::new("umount")
            .arg(device_root)
            .output()
            .map_err(|e| EjectFailure::spawn_failed("umount", e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(EjectFailure::from_output(&output))
        }
    }
}

/// One `findmnt` column for the filesystem mounted at `mount_point`
fn findmnt(mount_point: &Path, column: &str) -> Option<String> {
    let output = Command::new("findmnt")
        .args(["--noheadings", "--output", column, "--mountpoint"])
        .arg(mount_point)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automount_conventions() {
        let platform = LinuxPlatform::new();
        assert_eq!(
            platform.device_root(Path::new("/media/me/CARD/DCIM/a.jpg")),
            Some(PathBuf::from("/media/me/CARD"))
        );
        assert_eq!(
            platform.device_root(Path::new("/run/media/me/CARD/DCIM")),
            Some(PathBuf::from("/run/media/me/CARD"))
        );
        assert_eq!(
            platform.device_root(Path::new("/mnt/backup/2024")),
            Some(PathBuf::from("/mnt/backup"))
        );
    }

    #[test]
    fn other_paths_are_not_device_roots() {
        let platform = LinuxPlatform::new();
        assert_eq!(platform.device_root(Path::new("/home/me/Pictures")), None);
        assert_eq!(platform.device_root(Path::new("/media/me")), None);
        assert_eq!(platform.device_root(Path::new("/run/user/1000")), None);
        assert_eq!(platform.device_root(Path::new("relative/media/x")), None);
    }
}
