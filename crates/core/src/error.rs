use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced to callers of the monitoring commands.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("task path does not exist: {0}")]
    InvalidPath(PathBuf),

    #[error("video task not found: {0}")]
    NotFound(String),

    #[error("path is not inside the watch root: {0}")]
    UnresolvedTaskId(PathBuf),

    #[error("failed to register filesystem watch: {0}")]
    Watch(String),

    #[error("monitor service is not running")]
    ServiceStopped,
}
