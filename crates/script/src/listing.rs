use crate::manifest::Manifest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shotwatch_core::classify::{is_excluded_name, relative_to_root};
use shotwatch_core::path_utils::birth_time;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A regular file found under a task directory.
#[derive(Debug, Clone)]
pub struct ListedFile {
    pub path: PathBuf,
    /// Relative to the watch root, `/`-separated.
    pub relative: String,
    pub file_name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Walks `dir` with an explicit stack, skipping hidden entries and `cache`
/// subtrees. A directory that cannot be read contributes nothing.
pub fn list_files(dir: &Path, root: &Path) -> Vec<ListedFile> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("📂 Failed to read directory {:?}: {}", current, e);
                continue;
            }
        };

        let mut entries: Vec<_> = entries.flatten().collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            if is_excluded_name(&entry.file_name()) {
                continue;
            }
            let path = entry.path();
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    debug!("📂 Skipping {:?}: {}", path, e);
                    continue;
                }
            };

            if meta.is_dir() {
                stack.push(path);
            } else if meta.is_file() {
                let relative = relative_to_root(&path, root)
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_else(|| path.to_string_lossy().into_owned());
                files.push(ListedFile {
                    file_name: entry.file_name().to_string_lossy().into_owned(),
                    relative,
                    size: meta.len(),
                    created_at: birth_time(&meta),
                    path,
                });
            }
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    files
}

/// Immediate, non-hidden, non-cache subdirectories of the watch root.
pub fn task_directories(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)?
        .flatten()
        .filter(|entry| !is_excluded_name(&entry.file_name()))
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// A directory under the watch root that could become a task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDir {
    pub id: String,
    pub path: PathBuf,
    pub title: String,
    pub has_manifest: bool,
}

/// Lists candidate task directories, titling each from its manifest when one
/// parses and from the directory name otherwise.
pub fn scan_candidates(root: &Path, manifest_name: &str) -> std::io::Result<Vec<CandidateDir>> {
    let candidates = task_directories(root)?
        .into_iter()
        .filter_map(|path| {
            let id = path.file_name()?.to_string_lossy().into_owned();
            let manifest_path = path.join(manifest_name);
            let has_manifest = manifest_path.is_file();
            let title = if has_manifest {
                match Manifest::load(&manifest_path) {
                    Ok(manifest) => manifest.title,
                    Err(e) => {
                        warn!("📜 Failed to parse {:?}: {}", manifest_path, e);
                        id.clone()
                    }
                }
            } else {
                id.clone()
            };
            Some(CandidateDir { id, path, title, has_manifest })
        })
        .collect();
    Ok(candidates)
}
