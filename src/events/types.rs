//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the catalog engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Indexing run events
    Index(IndexEvent),
    /// Volume connection changes
    Volume(VolumeEvent),
    /// Rendition cache events
    Rendition(RenditionEvent),
}

/// Lifecycle status of an indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Scanning,
    Indexing,
    Paused,
    Completed,
    Cancelled,
    Error,
}

impl RunStatus {
    /// Whether the run has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Cancelled | RunStatus::Error
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Idle => "idle",
            RunStatus::Scanning => "scanning",
            RunStatus::Indexing => "indexing",
            RunStatus::Paused => "paused",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Progress snapshot for an indexing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexProgress {
    /// Directory being indexed
    pub root: PathBuf,
    /// Files discovered by the scan (0 until the scan finishes)
    pub total: usize,
    /// Files processed so far
    pub indexed: usize,
    /// File most recently processed
    pub current_file: Option<PathBuf>,
    /// Run status
    pub status: RunStatus,
    /// Whether the worker is currently paused
    pub is_paused: bool,
}

impl IndexProgress {
    /// Initial progress for a run that has just started
    pub fn starting(root: PathBuf) -> Self {
        Self {
            root,
            total: 0,
            indexed: 0,
            current_file: None,
            status: RunStatus::Scanning,
            is_paused: false,
        }
    }
}

/// Events from the indexing orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexEvent {
    /// A run started for a directory
    Started { root: PathBuf, volume_id: String },
    /// Progress update
    Progress(IndexProgress),
    /// A batch of assets was committed to the catalog
    Flushed { root: PathBuf, records: usize },
    /// Run finished
    Finished { summary: RunSummary },
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Directory that was indexed
    pub root: PathBuf,
    /// Final status (completed, cancelled or error)
    pub status: RunStatus,
    /// Files discovered by the scan
    pub total: usize,
    /// Files indexed and committed
    pub indexed: usize,
    /// Assets marked missing after the run
    pub missing: usize,
    /// Failure description for errored runs
    pub error: Option<String>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Volume connection events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VolumeEvent {
    /// A volume was seen (first time or reconnected)
    Connected { uuid: String, label: String },
    /// A volume's mount point vanished
    Disconnected { uuid: String, label: String },
    /// A volume was ejected on request
    Ejected { uuid: String, label: String },
}

/// Rendition cache events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RenditionEvent {
    /// A rendition was written to the cache
    Regenerated {
        asset_id: String,
        kind: String,
        path: PathBuf,
    },
    /// Regeneration failed; the asset shows a placeholder
    Failed {
        asset_id: String,
        kind: String,
        message: String,
    },
}
