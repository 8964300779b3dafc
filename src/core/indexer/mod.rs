//! # Indexer Module
//!
//! Turns a directory into catalog rows without blocking the caller.
//!
//! ## Run lifecycle
//! `scanning → indexing → completed | cancelled | error`, with
//! `indexing ⇄ paused` in between. One run is active at a time.
//!
//! ## Threads
//! - **Worker** - scans and extracts, talking only through channels
//! - **Coordinator** - folds worker events into progress and writes queued
//!   results every 2 s, or early past 1000 pending records
//!
//! A final flush runs however the run ends.

mod file;
mod orchestrator;
mod worker;

pub use file::index_file;
pub use orchestrator::{ContentChangeListener, FlushPolicy, IndexOrchestrator};
pub use worker::{IndexWorker, MediaIndexWorker, WorkerCommand, WorkerEvent, WorkerJob};
