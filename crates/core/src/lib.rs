//! Shotwatch core: configuration, path helpers, the data model shared by every
//! other crate, and the pure path classification rules.

pub mod config;
pub mod path_utils;
pub mod classify;
pub mod types;
pub mod error;

pub use error::MonitorError;
pub use types::{AssetFile, FileType, ShotDetail, ShotSpec, TaskState, TaskStatus};

use tracing::info;

pub fn init() {
    info!("🎬 Shotwatch Core Initialized");
}
