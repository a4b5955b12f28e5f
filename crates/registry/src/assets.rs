use crate::TaskRegistry;
use shotwatch_broadcast::HubEvent;
use shotwatch_core::{AssetFile, MonitorError};
use shotwatch_script::binds_to;
use tracing::{debug, info};

impl TaskRegistry {
    /// Applies an added or changed file. Returns false when the event was
    /// dropped because the task is unknown or paused.
    pub fn apply_file_upsert(&mut self, asset: AssetFile) -> bool {
        let Some(task) = self.tasks.get_mut(&asset.task_id) else {
            debug!("🗂️ Registry: no task for {}", asset.file_path);
            return false;
        };
        if !task.monitoring {
            return false;
        }

        for shot in task.shots.iter_mut() {
            if binds_to(&asset.file_name, shot.spec.shot_number) {
                shot.upsert_asset(asset.clone());
            }
        }
        let known = task.upsert_asset(asset.clone());
        task.touch();

        info!(
            "{} Registry: {} in task {}",
            if known { "✏️" } else { "➕" },
            asset.file_path,
            asset.task_id
        );
        self.publish(if known { HubEvent::FileModified(asset) } else { HubEvent::FileAdded(asset) });
        true
    }

    /// Applies a deleted file, matched by `task_id` and `file_path`. Shot
    /// bindings are dropped even when the task-level list missed the file.
    /// Unknown paths are a no-op.
    pub fn apply_file_remove(&mut self, asset: &AssetFile) -> bool {
        let Some(task) = self.tasks.get_mut(&asset.task_id) else {
            return false;
        };
        if !task.monitoring {
            return false;
        }

        let listed = task.remove_asset(&asset.file_path);
        let mut bound = false;
        for shot in task.shots.iter_mut() {
            bound |= shot.remove_asset(&asset.file_path);
        }
        let Some(removed) = listed.or_else(|| bound.then(|| asset.clone())) else {
            return false;
        };
        task.touch();

        info!("➖ Registry: {} left task {}", removed.file_path, removed.task_id);
        self.publish(HubEvent::FileDeleted(removed));
        true
    }

    /// Re-reads the manifest of a monitored task after it changed on disk.
    /// Returns false for a paused task.
    pub fn reload_manifest(&mut self, task_id: &str) -> Result<bool, MonitorError> {
        let task = self.tasks.get(task_id).ok_or_else(|| MonitorError::NotFound(task_id.to_string()))?;
        if !task.monitoring {
            return Ok(false);
        }
        let dir = self
            .paths
            .get(task_id)
            .cloned()
            .ok_or_else(|| MonitorError::NotFound(task_id.to_string()))?;

        self.refresh_manifest(task_id, &dir);
        if let Some(task) = self.tasks.get_mut(task_id) {
            task.touch();
        }
        info!("📜 Registry: reloaded manifest for {}", task_id);
        self.publish_task(task_id);
        Ok(true)
    }
}
