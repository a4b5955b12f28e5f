//! Readiness probing.
//!
//! A create notification can arrive before the writer has flushed anything,
//! so file events are held back until the file reports a non-zero size.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("not ready after {attempts} attempts: {path:?}")]
    NotReady { path: PathBuf, attempts: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct ProbePolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

async fn probe<F>(path: &Path, policy: ProbePolicy, ready: F) -> Result<Metadata, ProbeError>
where
    F: Fn(&Metadata) -> bool,
{
    for attempt in 1..=policy.max_retries {
        if let Ok(meta) = tokio::fs::metadata(path).await {
            if ready(&meta) {
                return Ok(meta);
            }
        }
        if attempt < policy.max_retries {
            tokio::time::sleep(policy.delay).await;
        }
    }
    Err(ProbeError::NotReady { path: path.to_path_buf(), attempts: policy.max_retries })
}

/// Waits until `path` is a regular file with content.
pub async fn wait_file_ready(path: &Path, policy: ProbePolicy) -> Result<Metadata, ProbeError> {
    probe(path, policy, |meta| meta.is_file() && meta.len() > 0).await
}

/// Waits until `path` resolves to a directory.
pub async fn wait_dir_ready(path: &Path, policy: ProbePolicy) -> Result<(), ProbeError> {
    probe(path, policy, Metadata::is_dir).await.map(|_| ())
}
