//! Path utilities for Shotwatch
//!
//! Handles tilde expansion and turning user-supplied paths into the absolute,
//! segment-comparable form the classifier expects.

use chrono::{DateTime, Utc};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Expands a leading `~/` to the user's home directory.
/// "~/videos" -> "/home/ana/videos"
/// "/tmp/foo" -> "/tmp/foo" (no change)
pub fn expand_tilde(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            format!("{}/{}", home, rest)
        }
        None if path == "~" => std::env::var("HOME").unwrap_or_else(|_| ".".to_string()),
        None => path.to_string(),
    }
}

/// Resolves a configured or user-supplied path against the current directory
/// without touching the filesystem (symlinks are left alone).
pub fn absolutize(path: &str) -> PathBuf {
    let expanded = PathBuf::from(expand_tilde(path));
    let absolute = std::path::absolute(&expanded).unwrap_or(expanded);
    normalize(&absolute)
}

/// Lexically drops `.` components and folds `..` into its parent.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// The normal (named) segments of a path, ignoring root, prefix and `.`.
pub fn segments(path: &Path) -> Vec<&OsStr> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Creation time from metadata, falling back to mtime on filesystems that do
/// not record birth time.
pub fn birth_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.created()
        .or_else(|_| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
