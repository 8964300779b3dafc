//! # Config Module
//!
//! Engine settings with sensible per-user defaults.
//!
//! Every field has a default, so a config file only needs the keys it
//! overrides:
//! ```json
//! { "rendition_concurrency": 4, "ffmpeg": "/opt/homebrew/bin/ffmpeg" }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "media-catalog";

/// Settings shared by every engine component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite catalog location
    pub catalog_path: PathBuf,
    /// Flat directory holding rendition files
    pub rendition_dir: PathBuf,
    /// Distinct assets allowed to regenerate at once
    pub rendition_concurrency: usize,
    /// Longest edge of generated thumbnails, in pixels
    pub thumbnail_edge: u32,
    /// Milliseconds between periodic catalog flushes
    pub flush_interval_ms: u64,
    /// Pending records that trigger an early flush
    pub flush_threshold: usize,
    /// Upper bound on photo metadata extraction, in milliseconds
    pub photo_timeout_ms: u64,
    /// Media prober binary
    pub ffprobe: String,
    /// Frame grabber binary
    pub ffmpeg: String,
    /// Embedded preview extractor binary
    pub exiftool: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            catalog_path: data_dir.join("catalog.db"),
            rendition_dir: cache_dir.join("renditions"),
            rendition_concurrency: 2,
            thumbnail_edge: 320,
            flush_interval_ms: 2_000,
            flush_threshold: 1_000,
            photo_timeout_ms: 10_000,
            ffprobe: "ffprobe".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            exiftool: "exiftool".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file, filling gaps with defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: EngineConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Default config rooted in a single directory (tests, portable installs)
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            catalog_path: dir.join("catalog.db"),
            rendition_dir: dir.join("renditions"),
            ..Self::default()
        }
    }

    /// Reject settings that would stall the engine
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rendition_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "rendition_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.flush_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "flush_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "flush_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.thumbnail_edge < 16 {
            return Err(ConfigError::Invalid {
                field: "thumbnail_edge",
                reason: "must be at least 16 pixels".to_string(),
            });
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn photo_timeout(&self) -> Duration {
        Duration::from_millis(self.photo_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_engine_limits() {
        let config = EngineConfig::default();
        assert_eq!(config.rendition_concurrency, 2);
        assert_eq!(config.flush_interval(), Duration::from_secs(2));
        assert_eq!(config.flush_threshold, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "rendition_concurrency": 4 }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.rendition_concurrency, 4);
        assert_eq!(config.ffprobe, "ffprobe");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "rendition_concurrency": 0 }"#).unwrap();

        let error = EngineConfig::load(&path).unwrap_err();
        assert!(error.to_string().contains("rendition_concurrency"));
    }

    #[test]
    fn malformed_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let error = EngineConfig::load(&path).unwrap_err();
        assert!(error.to_string().contains("config.json"));
    }
}
