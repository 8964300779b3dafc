//! # Events Module
//!
//! Event-driven progress reporting for any UI layer.
//!
//! ## Design
//! The engine emits events through channels, allowing a CLI, GUI or IPC
//! bridge to subscribe and display indexing progress, volume changes and
//! rendition failures.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Index(IndexEvent::Progress(p)) = event {
//!             println!("{}/{} {}", p.indexed, p.total, p.status);
//!         }
//!     }
//! });
//!
//! library.start_indexing("/Volumes/Card".as_ref())?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender};
pub use types::*;
