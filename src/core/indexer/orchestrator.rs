//! Run coordination: one active run, batched catalog writes.

use super::worker::{IndexWorker, WorkerCommand, WorkerEvent, WorkerJob};
use crate::core::catalog::{Asset, AssetStatus, CatalogStore};
use crate::core::volume::relative_path;
use crate::error::IndexError;
use crate::events::{Event, EventSender, IndexEvent, IndexProgress, RunStatus, RunSummary};
use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// When queued results are written to the catalog
#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    /// Regular flush period
    pub interval: Duration,
    /// Flush early once more than this many records are queued
    pub threshold: usize,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            threshold: 1000,
        }
    }
}

/// Told when a flush rewrites existing assets with new content
pub trait ContentChangeListener: Send + Sync {
    fn content_changed(&self, asset_ids: &[String]);
}

/// Where a run's coordinator leaves its summary; `None` if it panicked
#[derive(Default)]
struct RunSlot {
    state: Mutex<Option<Option<RunSummary>>>,
    done: Condvar,
}

impl RunSlot {
    /// First call wins
    fn complete(&self, summary: Option<RunSummary>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.is_none() {
            *state = Some(summary);
            self.done.notify_all();
        }
    }

    fn wait(&self) -> Option<RunSummary> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(summary) = state.as_ref() {
                return summary.clone();
            }
            state = self.done.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// Releases waiters even when the coordinator unwinds
struct SlotGuard(Arc<RunSlot>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("index coordinator panicked");
        }
        self.0.complete(None);
    }
}

struct ActiveRun {
    root: PathBuf,
    commands: Sender<WorkerCommand>,
    progress: Arc<Mutex<IndexProgress>>,
    slot: Arc<RunSlot>,
    coordinator: Option<JoinHandle<()>>,
}

/// Drives an [`IndexWorker`] and owns the state of the current run
pub struct IndexOrchestrator {
    catalog: Arc<dyn CatalogStore>,
    worker: Arc<dyn IndexWorker>,
    events: EventSender,
    policy: FlushPolicy,
    listener: Option<Arc<dyn ContentChangeListener>>,
    active: Mutex<Option<ActiveRun>>,
}

impl IndexOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        worker: Arc<dyn IndexWorker>,
        events: EventSender,
        policy: FlushPolicy,
    ) -> Self {
        Self {
            catalog,
            worker,
            events,
            policy,
            listener: None,
            active: Mutex::new(None),
        }
    }

    /// Notify `listener` of assets whose content changed between runs
    pub fn with_listener(mut self, listener: Arc<dyn ContentChangeListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        // Poisoning only means a caller panicked mid-update; the slot is still usable.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start indexing `job.root`, stopping any previous run first
    pub fn start(&self, job: WorkerJob) -> Result<(), IndexError> {
        let mut active = self.lock_active();

        if let Some(previous) = active.as_mut() {
            stop_and_join(previous);
        }

        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let progress = Arc::new(Mutex::new(IndexProgress::starting(job.root.clone())));

        let worker = self.worker.clone();
        let worker_job = job.clone();
        let worker_handle = std::thread::Builder::new()
            .name("index-worker".to_string())
            .spawn(move || worker.run(worker_job, command_rx, event_tx))
            .map_err(|e| IndexError::WorkerFailed(e.to_string()))?;

        tracing::info!(root = %job.root.display(), volume = %job.volume_id, "indexing started");
        self.events.send(Event::Index(IndexEvent::Started {
            root: job.root.clone(),
            volume_id: job.volume_id.clone(),
        }));

        let coordinator = Coordinator {
            job: job.clone(),
            catalog: self.catalog.clone(),
            events: self.events.clone(),
            policy: self.policy,
            progress: progress.clone(),
            commands: command_tx.clone(),
            listener: self.listener.clone(),
            queue: Vec::new(),
            seen: HashSet::new(),
            started: Instant::now(),
        };
        let slot = Arc::new(RunSlot::default());
        let guard = SlotGuard(slot.clone());
        let coordinator_handle = std::thread::Builder::new()
            .name("index-coordinator".to_string())
            .spawn(move || {
                let summary = coordinator.run(event_rx, worker_handle);
                guard.0.complete(Some(summary));
            })
            .map_err(|e| IndexError::WorkerFailed(e.to_string()))?;

        *active = Some(ActiveRun {
            root: job.root,
            commands: command_tx,
            progress,
            slot,
            coordinator: Some(coordinator_handle),
        });
        Ok(())
    }

    /// Apply `f` to the run for `path` if it is still live
    fn with_live_run<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&ActiveRun) -> T,
    ) -> Result<T, IndexError> {
        let active = self.lock_active();
        match active.as_ref() {
            Some(run) if run.root == path && !snapshot(&run.progress).status.is_terminal() => {
                Ok(f(run))
            }
            _ => Err(IndexError::NoActiveRun {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn pause(&self, path: &Path) -> Result<(), IndexError> {
        self.with_live_run(path, |run| {
            let _ = run.commands.send(WorkerCommand::Pause);
            let mut progress = lock(&run.progress);
            progress.is_paused = true;
            progress.status = RunStatus::Paused;
            self.events.send(Event::Index(IndexEvent::Progress(progress.clone())));
        })
    }

    pub fn resume(&self, path: &Path) -> Result<(), IndexError> {
        self.with_live_run(path, |run| {
            let _ = run.commands.send(WorkerCommand::Resume);
            let mut progress = lock(&run.progress);
            progress.is_paused = false;
            progress.status = if progress.total == 0 && progress.indexed == 0 {
                RunStatus::Scanning
            } else {
                RunStatus::Indexing
            };
            self.events.send(Event::Index(IndexEvent::Progress(progress.clone())));
        })
    }

    /// Ask the run to stop; the final flush still happens
    pub fn cancel(&self, path: &Path) -> Result<(), IndexError> {
        self.with_live_run(path, |run| {
            let _ = run.commands.send(WorkerCommand::Cancel);
        })
    }

    /// Progress of the current or most recent run for `path`
    pub fn progress(&self, path: &Path) -> Option<IndexProgress> {
        let active = self.lock_active();
        active
            .as_ref()
            .filter(|run| run.root == path)
            .map(|run| snapshot(&run.progress))
    }

    /// Block until the current run finishes.
    ///
    /// A waiter keeps waiting on the run it found even if another run is
    /// started meanwhile.
    pub fn wait(&self) -> Option<RunSummary> {
        let slot = self.lock_active().as_ref()?.slot.clone();
        slot.wait()
    }
}

impl Drop for IndexOrchestrator {
    fn drop(&mut self) {
        if let Some(run) = self.lock_active().as_mut() {
            stop_and_join(run);
        }
    }
}

fn lock(progress: &Mutex<IndexProgress>) -> MutexGuard<'_, IndexProgress> {
    progress.lock().unwrap_or_else(|e| e.into_inner())
}

fn snapshot(progress: &Mutex<IndexProgress>) -> IndexProgress {
    lock(progress).clone()
}

/// Cancel the run (a no-op once it ended) and wait for its summary
fn stop_and_join(run: &mut ActiveRun) {
    let _ = run.commands.send(WorkerCommand::Cancel);
    run.slot.wait();
    if let Some(handle) = run.coordinator.take() {
        let _ = handle.join();
    }
}

/// How the worker's event stream ended
enum Outcome {
    Completed,
    Cancelled,
    Failed(String),
}

struct Coordinator {
    job: WorkerJob,
    catalog: Arc<dyn CatalogStore>,
    events: EventSender,
    policy: FlushPolicy,
    progress: Arc<Mutex<IndexProgress>>,
    commands: Sender<WorkerCommand>,
    listener: Option<Arc<dyn ContentChangeListener>>,
    queue: Vec<Asset>,
    seen: HashSet<String>,
    started: Instant,
}

impl Coordinator {
    fn run(mut self, events: Receiver<WorkerEvent>, worker: JoinHandle<()>) -> RunSummary {
        let ticker = tick(self.policy.interval);

        let mut outcome = loop {
            select! {
                recv(events) -> message => match message {
                    Ok(event) => {
                        if let Some(outcome) = self.handle(event) {
                            break outcome;
                        }
                    }
                    Err(_) => break Outcome::Failed("worker exited without reporting".to_string()),
                },
                recv(ticker) -> _ => {
                    if let Err(e) = self.flush() {
                        let _ = self.commands.send(WorkerCommand::Cancel);
                        break Outcome::Failed(e.to_string());
                    }
                }
            }
        };

        if let Err(payload) = worker.join() {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            outcome = Outcome::Failed(format!("worker panicked: {}", message));
        }

        if let Err(e) = self.flush() {
            if !matches!(outcome, Outcome::Failed(_)) {
                outcome = Outcome::Failed(e.to_string());
            }
        }

        let missing = match outcome {
            Outcome::Completed => match self.mark_missing() {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(error = %e, "missing reconciliation failed");
                    0
                }
            },
            _ => 0,
        };

        self.finish(outcome, missing)
    }

    /// Fold one worker event into the run; returns the outcome on a terminal event
    fn handle(&mut self, event: WorkerEvent) -> Option<Outcome> {
        match event {
            WorkerEvent::Scanned { total } => {
                self.update(|p| {
                    p.total = total;
                    if !p.is_paused {
                        p.status = RunStatus::Indexing;
                    }
                });
                None
            }
            WorkerEvent::Indexed {
                asset,
                current_file,
            } => {
                self.seen.insert(asset.id.clone());
                self.queue.push(asset);
                self.update(|p| {
                    p.indexed += 1;
                    p.current_file = Some(current_file);
                });
                if self.queue.len() > self.policy.threshold {
                    if let Err(e) = self.flush() {
                        let _ = self.commands.send(WorkerCommand::Cancel);
                        return Some(Outcome::Failed(e.to_string()));
                    }
                }
                None
            }
            WorkerEvent::Skipped { path, reason } => {
                tracing::debug!(path = %path.display(), reason, "file skipped");
                self.update(|p| p.current_file = Some(path));
                None
            }
            WorkerEvent::Completed => Some(Outcome::Completed),
            WorkerEvent::Cancelled => Some(Outcome::Cancelled),
            WorkerEvent::Failed(message) => Some(Outcome::Failed(message)),
        }
    }

    fn update(&self, f: impl FnOnce(&mut IndexProgress)) {
        let mut progress = lock(&self.progress);
        f(&mut progress);
        self.events
            .send(Event::Index(IndexEvent::Progress(progress.clone())));
    }

    fn flush(&mut self) -> Result<(), IndexError> {
        if self.queue.is_empty() {
            return Ok(());
        }

        let report = self.catalog.upsert_assets(&self.queue)?;
        self.queue.clear();
        if let Some(listener) = &self.listener {
            if !report.content_changed.is_empty() {
                listener.content_changed(&report.content_changed);
            }
        }
        let records = report.written;
        tracing::debug!(root = %self.job.root.display(), records, "flushed batch");
        self.events.send(Event::Index(IndexEvent::Flushed {
            root: self.job.root.clone(),
            records,
        }));
        Ok(())
    }

    /// Mark assets under the scanned folder that this run did not see
    fn mark_missing(&self) -> Result<usize, IndexError> {
        let prefix = relative_path(&self.job.root, &self.job.mount_point)?;
        let gone: Vec<String> = self
            .catalog
            .assets_under(&self.job.volume_id, &prefix)?
            .into_iter()
            .filter(|a| a.status != AssetStatus::Missing && !self.seen.contains(&a.id))
            .map(|a| a.id)
            .collect();

        if gone.is_empty() {
            return Ok(0);
        }
        Ok(self.catalog.set_asset_status(&gone, AssetStatus::Missing)?)
    }

    fn finish(self, outcome: Outcome, missing: usize) -> RunSummary {
        let (status, error) = match outcome {
            Outcome::Completed => (RunStatus::Completed, None),
            Outcome::Cancelled => (RunStatus::Cancelled, None),
            Outcome::Failed(message) => (RunStatus::Error, Some(message)),
        };

        self.update(|p| {
            p.status = status;
            p.is_paused = false;
        });
        let progress = snapshot(&self.progress);

        let summary = RunSummary {
            root: self.job.root.clone(),
            status,
            total: progress.total,
            indexed: progress.indexed,
            missing,
            error,
            duration_ms: self.started.elapsed().as_millis() as u64,
        };

        match &summary.error {
            Some(error) => {
                tracing::error!(root = %summary.root.display(), error, "indexing failed")
            }
            None => tracing::info!(
                root = %summary.root.display(),
                status = %summary.status,
                indexed = summary.indexed,
                missing,
                "indexing finished"
            ),
        }

        self.events.send(Event::Index(IndexEvent::Finished {
            summary: summary.clone(),
        }));
        summary
    }
}
