//! Shotwatch Engine - the monitor service
//!
//! One loop owns the task registry. Watcher output, discovery results and
//! commands from any number of [`MonitorHandle`] clones are handled there one
//! at a time.

mod handle;
mod service;

pub use handle::{MonitorHandle, MonitorStatus};
pub use service::MonitorService;
pub use shotwatch_registry::{SortOrder, TaskSort};
