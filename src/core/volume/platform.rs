//! Platform seam for mount-point, UUID and eject logic.

use crate::core::catalog::VolumeType;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Output;
use uuid::Uuid;

/// Namespace for volume ids synthesized from mount-point strings
const VOLUME_NAMESPACE: Uuid = Uuid::from_u128(0x6d65_6469_612d_766f_6c75_6d65_2d69_6400);

/// Why the OS refused to dismount a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EjectFailureKind {
    Busy,
    NotFound,
    Other,
}

/// Classified eject failure with the tool's own message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EjectFailure {
    pub kind: EjectFailureKind,
    pub detail: String,
}

impl EjectFailure {
    /// Classify a dismount tool's diagnostic text
    pub fn classify(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let lower = detail.to_lowercase();

        let kind = if ["busy", "in use", "dissented", "being used"]
            .iter()
            .any(|needle| lower.contains(needle))
        {
            EjectFailureKind::Busy
        } else if ["not found", "could not find", "no such", "not mounted", "unable to find"]
            .iter()
            .any(|needle| lower.contains(needle))
        {
            EjectFailureKind::NotFound
        } else {
            EjectFailureKind::Other
        };

        Self { kind, detail }
    }

    pub(crate) fn from_output(output: &Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Self::classify(detail)
    }

    pub(crate) fn spawn_failed(tool: &str, error: std::io::Error) -> Self {
        Self {
            kind: EjectFailureKind::Other,
            detail: format!("could not run {}: {}", tool, error),
        }
    }
}

/// Per-platform volume conventions
///
/// One implementation is selected at startup by [`current_platform`].
pub trait VolumePlatform: Send + Sync {
    /// Short platform name for logs
    fn name(&self) -> &'static str;

    /// The device root containing `path`, if it sits under one
    fn device_root(&self, path: &Path) -> Option<PathBuf>;

    /// Ask the OS for the volume's UUID or serial
    fn query_uuid(&self, device_root: &Path) -> Option<String>;

    /// Dismount a device root
    fn eject(&self, device_root: &Path) -> Result<(), EjectFailure>;

    /// Local, external or network
    fn classify(&self, mount_point: &Path, is_device_root: bool) -> VolumeType {
        if is_network_path(&mount_point.to_string_lossy()) {
            VolumeType::Network
        } else if is_device_root {
            VolumeType::External
        } else {
            VolumeType::Local
        }
    }

    fn is_absolute(&self, path: &Path) -> bool {
        path.is_absolute() || is_network_path(&path.to_string_lossy())
    }

    /// Display label for a newly seen volume
    fn label_for(&self, mount_point: &Path) -> String {
        mount_point
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| mount_point.display().to_string())
    }

    /// Whether a recorded mount point is still present
    fn is_mounted(&self, mount_point: &Path) -> bool {
        mount_point.exists()
    }
}

/// UNC and URL-style network prefixes
pub fn is_network_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    path.starts_with("\\\\")
        || path.starts_with("//")
        || ["smb://", "afp://", "nfs://", "cifs://"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
}

/// Deterministic id for a mount point without an OS UUID.
///
/// Stable across sessions, but renaming or moving the folder yields a new id.
pub fn synthesize_uuid(mount_point: &Path) -> String {
    Uuid::new_v5(&VOLUME_NAMESPACE, mount_point.to_string_lossy().as_bytes()).to_string()
}

/// First capture group of `pattern` in `text`, trimmed
pub(crate) fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The platform this binary was built for
pub fn current_platform() -> Box<dyn VolumePlatform> {
    if cfg!(target_os = "macos") {
        Box::new(super::macos::MacPlatform::new())
    } else if cfg!(target_os = "windows") {
        Box::new(super::windows::WindowsPlatform::from_env())
    } else {
        Box::new(super::linux::LinuxPlatform::new())
    }
}
