//! # Media Catalog
//!
//! Discovers, fingerprints and tracks photos and videos across removable
//! and fixed volumes, with a lazily built thumbnail/preview cache.
//!
//! ## Core Philosophy
//! - **Never block the caller** - indexing runs on its own threads
//! - **Identity survives remounts** - volumes keep their id across sessions
//! - **Renditions are disposable** - any cache file can be regenerated
//!
//! ## Architecture
//! - `core` - The cataloging engine
//! - `config` - Engine settings
//! - `events` - Event-driven progress reporting (GUI-ready)
//! - `error` - User-friendly error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use crate::config::EngineConfig;
pub use crate::core::{MediaLibrary, MediaLibraryBuilder};
pub use crate::error::{CatalogEngineError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
