use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A debounced, readiness-checked filesystem change.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A file under a task root was created or changed and has content.
    FileUpserted {
        path: PathBuf,
        size: u64,
        created_at: DateTime<Utc>,
    },
    FileRemoved { path: PathBuf },
    /// An immediate subdirectory of the discovery root appeared.
    DirAdded { path: PathBuf },
    DirRemoved { path: PathBuf },
}
