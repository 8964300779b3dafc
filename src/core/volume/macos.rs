//! macOS: removable media mounts under `/Volumes/<name>`.

use super::platform::{capture, EjectFailure, VolumePlatform};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

pub struct MacPlatform {
    volume_uuid: Regex,
    partition_uuid: Regex,
}

impl MacPlatform {
    pub fn new() -> Self {
        Self {
            volume_uuid: Regex::new(r"(?m)^\s*Volume UUID:\s*(\S+)").expect("static regex"),
            partition_uuid: Regex::new(r"(?m)^\s*Disk / Partition UUID:\s*(\S+)")
                .expect("static regex"),
        }
    }

    /// Pull the UUID out of `diskutil info` output
    pub fn parse_diskutil_info(&self, output: &str) -> Option<String> {
        capture(&self.volume_uuid, output).or_else(|| capture(&self.partition_uuid, output))
    }
}

impl Default for MacPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumePlatform for MacPlatform {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn device_root(&self, path: &Path) -> Option<PathBuf> {
        let mut components = path.components();
        match (components.next(), components.next(), components.next()) {
            (Some(Component::RootDir), Some(Component::Normal(volumes)), Some(Component::Normal(name)))
                if volumes == "Volumes" =>
            {
                Some(Path::new("/Volumes").join(name))
            }
            _ => None,
        }
    }

    fn query_uuid(&self, device_root: &Path) -> Option<String> {
        let output = Command::new("diskutil")
            .arg("info")
            .arg(device_root)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        self.parse_diskutil_info(&String::from_utf8_lossy(&output.stdout))
    }

    fn eject(&self, device_root: &Path) -> Result<(), EjectFailure> {
        let output = Command::new("diskutil")
            .arg("eject")
            .arg(device_root)
            .output()
            .map_err(|e| EjectFailure::spawn_failed("diskutil", e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(EjectFailure::from_output(&output))
        }
    }
}
