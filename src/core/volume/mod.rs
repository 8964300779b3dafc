//! # Volume Module
//!
//! Gives every storage location an identity that survives unplugging,
//! remounting and drive-letter reassignment.
//!
//! ## Identity
//! - Under a device root (`/Volumes/<name>`, `E:\`, `/media/<user>/<name>`)
//!   the OS volume UUID or serial is used, so a card keeps its id in any slot
//! - Any other folder becomes its own logical volume, identified by a hash
//!   of its path
//!
//! ## Lifecycle
//! Volumes are never deleted. Disconnecting flips their assets `offline`;
//! resolving a path on them again flips those assets back `online`.

mod linux;
mod macos;
mod manager;
mod platform;
mod windows;

pub use linux::LinuxPlatform;
pub use macos::MacPlatform;
pub use manager::{relative_path, MountLocation, VolumeManager};
pub use platform::{
    current_platform, is_network_path, synthesize_uuid, EjectFailure, EjectFailureKind,
    VolumePlatform,
};
pub use windows::WindowsPlatform;
