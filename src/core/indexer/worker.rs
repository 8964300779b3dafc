//! Background worker protocol and the scanning/extracting worker.

use super::file::index_file;
use crate::core::catalog::Asset;
use crate::core::metadata::MetadataExtractor;
use crate::core::scanner::MediaScanner;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::path::PathBuf;
use std::sync::Arc;

/// What a worker is asked to index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerJob {
    /// Directory to scan
    pub root: PathBuf,
    pub volume_id: String,
    pub mount_point: PathBuf,
}

/// Commands from the coordinator, observed between files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    Pause,
    Resume,
    Cancel,
}

/// Messages from the worker to the coordinator
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Scan finished with this many files
    Scanned { total: usize },
    /// One file indexed
    Indexed { asset: Asset, current_file: PathBuf },
    /// One file could not be indexed
    Skipped { path: PathBuf, reason: String },
    /// All files processed
    Completed,
    /// Stopped on request
    Cancelled,
    /// Stopped on a run-level failure
    Failed(String),
}

/// A unit of background indexing work
///
/// `run` executes on a dedicated thread and talks to the coordinator only
/// through the two channels. It must end with a terminal event; returning
/// without one (or panicking) fails the run.
pub trait IndexWorker: Send + Sync {
    fn run(&self, job: WorkerJob, commands: Receiver<WorkerCommand>, events: Sender<WorkerEvent>);
}

/// Outcome of checking the command channel between files
enum Gate {
    Continue,
    Stop,
}

/// Apply pending commands; blocks while paused
fn check_commands(commands: &Receiver<WorkerCommand>) -> Gate {
    let mut paused = false;
    loop {
        let next = if paused {
            commands.recv().map_err(|_| TryRecvError::Disconnected)
        } else {
            commands.try_recv()
        };

        match next {
            Ok(WorkerCommand::Pause) => paused = true,
            Ok(WorkerCommand::Resume) => paused = false,
            Ok(WorkerCommand::Cancel) | Err(TryRecvError::Disconnected) => return Gate::Stop,
            Err(TryRecvError::Empty) => return Gate::Continue,
        }
    }
}

/// Worker that walks the directory and indexes every file it finds
pub struct MediaIndexWorker {
    scanner: Arc<dyn MediaScanner>,
    extractor: Arc<dyn MetadataExtractor>,
}

impl MediaIndexWorker {
    pub fn new(scanner: Arc<dyn MediaScanner>, extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self { scanner, extractor }
    }
}

impl IndexWorker for MediaIndexWorker {
    fn run(&self, job: WorkerJob, commands: Receiver<WorkerCommand>, events: Sender<WorkerEvent>) {
        let files = match self.scanner.scan(&job.root) {
            Ok(files) => files,
            Err(e) => {
                let _ = events.send(WorkerEvent::Failed(e.to_string()));
                return;
            }
        };

        if events.send(WorkerEvent::Scanned { total: files.len() }).is_err() {
            return;
        }

        for path in files {
            if let Gate::Stop = check_commands(&commands) {
                let _ = events.send(WorkerEvent::Cancelled);
                return;
            }

            let event = match index_file(&path, &job.volume_id, &job.mount_point, self.extractor.as_ref()) {
                Ok(asset) => WorkerEvent::Indexed {
                    asset,
                    current_file: path,
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping file");
                    WorkerEvent::Skipped {
                        path,
                        reason: e.to_string(),
                    }
                }
            };

            if events.send(event).is_err() {
                return;
            }
        }

        let _ = events.send(WorkerEvent::Completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::MediaMetadata;
    use crate::core::scanner::{MediaType, WalkDirScanner};
    use crossbeam_channel::unbounded;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct NullExtractor;

    impl MetadataExtractor for NullExtractor {
        fn extract(&self, _path: &Path, _media_type: MediaType) -> MediaMetadata {
            MediaMetadata::default()
        }
    }

    fn worker() -> MediaIndexWorker {
        MediaIndexWorker::new(Arc::new(WalkDirScanner::new()), Arc::new(NullExtractor))
    }

    fn job(root: &Path) -> WorkerJob {
        WorkerJob {
            root: root.to_path_buf(),
            volume_id: "VOL".to_string(),
            mount_point: root.to_path_buf(),
        }
    }

    #[test]
    fn indexes_every_scanned_file_then_completes() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.jpg"), b"a").unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("sub/b.mp4"), b"b").unwrap();

        let (_command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        worker().run(job(temp_dir.path()), command_rx, event_tx);

        let events: Vec<WorkerEvent> = event_rx.try_iter().collect();
        assert!(matches!(events[0], WorkerEvent::Scanned { total: 2 }));
        let indexed: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Indexed { asset, .. } => Some(asset.relative_path.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(indexed, vec!["a.jpg", "sub/b.mp4"]);
        assert!(matches!(events.last(), Some(WorkerEvent::Completed)));
    }

    #[test]
    fn cancel_is_observed_before_the_next_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.jpg"), b"a").unwrap();

        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        command_tx.send(WorkerCommand::Cancel).unwrap();
        worker().run(job(temp_dir.path()), command_rx, event_tx);

        let events: Vec<WorkerEvent> = event_rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], WorkerEvent::Cancelled));
    }

    #[test]
    fn pause_then_resume_continues() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.jpg"), b"a").unwrap();

        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        command_tx.send(WorkerCommand::Pause).unwrap();
        command_tx.send(WorkerCommand::Resume).unwrap();
        worker().run(job(temp_dir.path()), command_rx, event_tx);

        assert!(event_rx.try_iter().any(|e| matches!(e, WorkerEvent::Completed)));
    }

    #[test]
    fn unreadable_root_fails_the_run() {
        let temp_dir = TempDir::new().unwrap();
        let (_command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        worker().run(job(&temp_dir.path().join("absent")), command_rx, event_tx);

        let events: Vec<WorkerEvent> = event_rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], WorkerEvent::Failed(_)));
    }
}
