use crate::TaskRegistry;
use shotwatch_broadcast::HubEvent;
use shotwatch_core::classify::{asset_for, derive_task_id, relative_to_root};
use shotwatch_core::path_utils::{absolutize, birth_time, segments};
use shotwatch_core::{AssetFile, MonitorError, TaskState};
use shotwatch_script::{Manifest, list_files, match_shots};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

impl TaskRegistry {
    /// Checks that `path` is a directory under the watch root and derives its
    /// task id. Touches no state, so callers can set up the watch first.
    pub fn resolve_task_dir(&self, path: &Path) -> Result<(String, PathBuf), MonitorError> {
        let path = absolutize(&path.to_string_lossy());
        if !path.is_dir() {
            return Err(MonitorError::InvalidPath(path));
        }
        let task_id = derive_task_id(&path, &self.root).ok_or_else(|| MonitorError::UnresolvedTaskId(path.clone()))?;
        Ok((task_id, path))
    }

    /// The directory recorded for `task_id`, provided it still exists.
    pub fn task_dir(&self, task_id: &str) -> Result<PathBuf, MonitorError> {
        let path = self.paths.get(task_id).ok_or_else(|| MonitorError::NotFound(task_id.to_string()))?;
        if !path.is_dir() {
            return Err(MonitorError::InvalidPath(path.clone()));
        }
        Ok(path.clone())
    }

    /// Begins (or re-begins) monitoring the task directory at `path`.
    ///
    /// The id always comes from the path's position under the watch root;
    /// `hint` is only compared for logging. An existing task keeps its assets
    /// and `folderCreatedAt`; files that appeared meanwhile are added so every
    /// shot binding has a matching asset.
    pub fn start_monitoring(&mut self, hint: &str, path: &Path) -> Result<TaskState, MonitorError> {
        let (task_id, path) = self.resolve_task_dir(path)?;
        if task_id != hint {
            debug!("🗂️ Registry: hint {:?} resolved to task {:?}", hint, task_id);
        }

        let manifest_path = path.join(&self.manifest_name);
        if !self.tasks.contains_key(&task_id) {
            let meta = std::fs::metadata(&path).map_err(|_| MonitorError::InvalidPath(path.clone()))?;
            let task = TaskState::new(task_id.clone(), manifest_path.clone(), birth_time(&meta));
            self.tasks.insert(task_id.clone(), task);
            info!("🗂️ Registry: new task {}", task_id);
        }

        self.sync_assets(&task_id, &path, false);
        self.refresh_manifest(&task_id, &path);

        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.manifest_path = manifest_path;
            task.monitoring = true;
            task.touch();
        }
        self.paths.insert(task_id.clone(), path);
        self.publish_task(&task_id);

        self.tasks.get(&task_id).cloned().ok_or(MonitorError::NotFound(task_id))
    }

    /// Re-reads a known task from disk after its directory was replaced.
    /// The monitoring flag is left as it was.
    pub fn resync_task(&mut self, task_id: &str) -> Result<TaskState, MonitorError> {
        let dir = self.task_dir(task_id)?;
        self.sync_assets(task_id, &dir, true);
        self.refresh_manifest(task_id, &dir);

        let task = self.tasks.get_mut(task_id).ok_or_else(|| MonitorError::NotFound(task_id.to_string()))?;
        task.touch();
        let snapshot = task.clone();
        info!("🔄 Registry: resynced {} with {} assets", task_id, snapshot.assets.len());
        self.publish_task(task_id);
        Ok(snapshot)
    }

    /// Pauses event application. The watch and the state are kept.
    pub fn stop_monitoring(&mut self, task_id: &str) -> Result<TaskState, MonitorError> {
        let task = self.tasks.get_mut(task_id).ok_or_else(|| MonitorError::NotFound(task_id.to_string()))?;
        task.monitoring = false;
        task.touch();
        let snapshot = task.clone();
        info!("⏸️ Registry: stopped monitoring {}", task_id);
        self.publish_task(task_id);
        Ok(snapshot)
    }

    /// Re-enables monitoring. The caller re-registers [`Self::task_dir`]
    /// with the watcher first.
    pub fn resume_monitoring(&mut self, task_id: &str) -> Result<TaskState, MonitorError> {
        self.task_dir(task_id)?;
        let task = self.tasks.get_mut(task_id).ok_or_else(|| MonitorError::NotFound(task_id.to_string()))?;
        task.monitoring = true;
        task.touch();
        let snapshot = task.clone();
        info!("▶️ Registry: resumed monitoring {}", task_id);
        self.publish_task(task_id);
        Ok(snapshot)
    }

    /// Drops the task whose directory vanished. Returns its id when one was
    /// removed. Paths that are not a direct child of the root are ignored.
    pub fn on_directory_removed(&mut self, path: &Path) -> Option<String> {
        let relative = relative_to_root(path, &self.root)?;
        if segments(&relative).len() != 1 {
            return None;
        }
        let task_id = derive_task_id(path, &self.root)?;

        self.tasks.remove(&task_id)?;
        self.paths.remove(&task_id);
        info!("🗑️ Registry: task {} removed with its directory", task_id);
        self.publish(HubEvent::TaskRemoved { task_id: task_id.clone() });
        Some(task_id)
    }

    /// Brings the task's assets in line with the directory listing. Without
    /// `replace`, known entries are kept and only new files are added; with it,
    /// the list is rebuilt and shot bindings to vanished files are dropped.
    fn sync_assets(&mut self, task_id: &str, dir: &Path, replace: bool) {
        let fresh: Vec<AssetFile> = list_files(dir, &self.root)
            .into_iter()
            .filter_map(|file| asset_for(&file.path, &self.root, file.size, file.created_at))
            .collect();
        let Some(task) = self.tasks.get_mut(task_id) else {
            return;
        };

        let before = task.assets.len();
        if replace {
            let present: HashSet<&str> = fresh.iter().map(|a| a.file_path.as_str()).collect();
            for shot in task.shots.iter_mut() {
                shot.assets.retain(|a| present.contains(a.file_path.as_str()));
            }
            task.assets.clear();
        }
        for asset in fresh {
            if task.asset(&asset.file_path).is_none() {
                task.upsert_asset(asset);
            }
        }
        debug!("🗂️ Registry: {} assets {} -> {}", task_id, before, task.assets.len());
    }

    /// Re-parses the manifest and rebuilds the shot list from a fresh listing.
    /// A parse failure leaves an existing title and shot list untouched.
    pub(crate) fn refresh_manifest(&mut self, task_id: &str, dir: &Path) {
        let manifest_path = dir.join(&self.manifest_name);
        if !manifest_path.is_file() {
            debug!("🗂️ Registry: {} has no manifest yet", task_id);
            return;
        }

        let manifest = match Manifest::load(&manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("📜 Registry: failed to parse {:?}: {}", manifest_path, e);
                return;
            }
        };

        let files = list_files(dir, &self.root);
        let shots = match_shots(task_id, &manifest.shots, &files, &self.root);
        if let Some(task) = self.tasks.get_mut(task_id) {
            task.title = manifest.title;
            task.shots = shots;
        }
    }
}
