//! Windows: every non-system drive letter is a device root.
//!
//! Paths are handled as strings so the rules are testable on any host.

use super::platform::{capture, is_network_path, EjectFailure, VolumePlatform};
use crate::core::catalog::VolumeType;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct WindowsPlatform {
    /// Upper-case letter of the system drive, usually `C`
    system_drive: char,
    serial: Regex,
}

impl WindowsPlatform {
    pub fn new(system_drive: char) -> Self {
        Self {
            system_drive: system_drive.to_ascii_uppercase(),
            serial: Regex::new(r"(?i)serial number is\s+([0-9A-F]{4}-[0-9A-F]{4})")
                .expect("static regex"),
        }
    }

    /// Read `%SystemDrive%`, defaulting to `C:`
    pub fn from_env() -> Self {
        let letter = std::env::var("SystemDrive")
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or('C');
        Self::new(letter)
    }

    fn drive_letter(path: &str) -> Option<char> {
        let mut chars = path.chars();
        let letter = chars.next()?;
        (letter.is_ascii_alphabetic() && chars.next() == Some(':'))
            .then(|| letter.to_ascii_uppercase())
    }

    /// Serial from `vol X:` output
    pub fn parse_vol_output(&self, output: &str) -> Option<String> {
        capture(&self.serial, output)
    }
}

impl VolumePlatform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn device_root(&self, path: &Path) -> Option<PathBuf> {
        let text = path.to_string_lossy();
        let letter = Self::drive_letter(&text)?;
        (letter != self.system_drive).then(|| PathBuf::from(format!("{}:\\", letter)))
    }

    fn query_uuid(&self, device_root: &Path) -> Option<String> {
        let letter = Self::drive_letter(&device_root.to_string_lossy())?;
        let output = Command::new("cmd")
            .args(["/C", &format!("vol {}:", letter)])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        self.parse_vol_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn eject(&self, device_root: &Path) -> Result<(), EjectFailure> {
        let letter = Self::drive_letter(&device_root.to_string_lossy())
            .ok_or_else(|| EjectFailure::classify(format!("no drive letter in {}", device_root.display())))?;

        // Shell.Application namespace 17 is "This PC".
        let script = format!(
            "$item = (New-Object -ComObject Shell.Application).Namespace(17).ParseName('{}:'); \
             if ($null -eq $item) {{ Write-Error 'Drive not found'; exit 2 }}; \
             $item.InvokeVerb('Eject')",
            letter
        );
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", &script])
            .output()
            .map_err(|e| EjectFailure::spawn_failed("powershell", e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(EjectFailure::from_output(&output))
        }
    }

    fn classify(&self, mount_point: &Path, _is_device_root: bool) -> VolumeType {
        let text = mount_point.to_string_lossy();
        if is_network_path(&text) {
            return VolumeType::Network;
        }
        match Self::drive_letter(&text) {
            Some(letter) if letter != self.system_drive => VolumeType::External,
            _ => VolumeType::Local,
        }
    }

    fn is_absolute(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        is_network_path(&text)
            || (Self::drive_letter(&text).is_some()
                && matches!(text.chars().nth(2), Some('\\') | Some('/')))
    }

    fn label_for(&self, mount_point: &Path) -> String {
        let text = mount_point.to_string_lossy();
        let trimmed = text.trim_end_matches(|c: char| c == '\\' || c == '/');
        trimmed
            .rsplit(|c: char| c == '\\' || c == '/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(trimmed)
            .to_string()
    }
}
