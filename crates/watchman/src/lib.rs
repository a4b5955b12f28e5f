//! Shotwatch Watchman - Filesystem Observer
//!
//! This crate is organized into:
//! - types: events handed to the consumer loop
//! - ignore: which paths under which roots produce events
//! - readiness: probing until a file has content or a directory exists
//! - debounce: per-path coalescing of notification bursts
//! - watcher: the notify bridge and event pump
//! - discovery: manifest polling for new directories

mod types;
mod ignore;
pub mod readiness;
pub mod debounce;
mod watcher;
pub mod discovery;

pub use debounce::{ChangeKind, Debouncer};
pub use discovery::{DiscoveryEvent, DiscoveryMonitor, DiscoveryOutcome, DiscoveryPolicy};
pub use readiness::{ProbeError, ProbePolicy};
pub use types::WatchEvent;
pub use watcher::{PathWatcher, WatcherSettings};
