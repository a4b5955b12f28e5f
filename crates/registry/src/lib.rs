//! Shotwatch Registry - the in-memory task model
//!
//! This crate is organized into:
//! - lifecycle: start/stop/resume monitoring and directory removal
//! - assets: incremental asset events and manifest reloads
//! - sort: ordering for task listings
//!
//! The registry is owned by exactly one event loop and is not `Sync`-guarded;
//! every mutation goes through `&mut self`.

mod lifecycle;
mod assets;
mod sort;

pub use sort::{SortOrder, TaskSort};

use shotwatch_broadcast::{BroadcastHub, HubEvent};
use shotwatch_core::TaskState;
use shotwatch_core::classify::derive_task_id;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct TaskRegistry {
    root: PathBuf,
    manifest_name: String,
    tasks: HashMap<String, TaskState>,
    /// Task id to the absolute directory being watched for it.
    paths: HashMap<String, PathBuf>,
    hub: BroadcastHub,
}

impl TaskRegistry {
    pub fn new(root: PathBuf, manifest_name: impl Into<String>, hub: BroadcastHub) -> Self {
        Self {
            root,
            manifest_name: manifest_name.into(),
            tasks: HashMap::new(),
            paths: HashMap::new(),
            hub,
        }
    }

    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskState> {
        self.tasks.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn watch_path(&self, task_id: &str) -> Option<&Path> {
        self.paths.get(task_id).map(PathBuf::as_path)
    }

    /// Snapshot of every task, ordered by `sort` and `order`.
    pub fn list(&self, sort: TaskSort, order: SortOrder) -> Vec<TaskState> {
        let mut tasks: Vec<TaskState> = self.tasks.values().cloned().collect();
        sort::sort_tasks(&mut tasks, sort, order);
        tasks
    }

    /// The task whose manifest lives at `path`, if any.
    pub fn task_for_manifest(&self, path: &Path) -> Option<String> {
        if path.file_name()? != self.manifest_name.as_str() {
            return None;
        }
        let task_id = derive_task_id(path, &self.root)?;
        let task = self.tasks.get(&task_id)?;
        (task.manifest_path == path).then_some(task_id)
    }

    fn publish(&self, event: HubEvent) {
        self.hub.publish(event);
    }

    fn publish_task(&self, task_id: &str) {
        if let Some(task) = self.tasks.get(task_id) {
            self.publish(HubEvent::TaskUpdated(Box::new(task.clone())));
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::fs;

    pub struct Fixture {
        pub _tmp: tempfile::TempDir,
        pub root: PathBuf,
        pub registry: TaskRegistry,
        pub events: shotwatch_broadcast::Subscription,
    }

    impl Fixture {
        pub fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let root = tmp.path().join("data");
            fs::create_dir_all(&root).unwrap();
            let hub = BroadcastHub::new(64);
            let events = hub.subscribe();
            let registry = TaskRegistry::new(root.clone(), "script.json", hub);
            Self { _tmp: tmp, root, registry, events }
        }

        /// Creates `<root>/<id>` with a manifest declaring `shots` shots.
        pub fn task_dir(&self, id: &str, title: &str, shots: usize) -> PathBuf {
            let dir = self.root.join(id);
            fs::create_dir_all(&dir).unwrap();
            let shots: Vec<String> = (0..shots)
                .map(|i| format!(r#"{{"shot_id":"s{}","start_sec":{},"end_sec":{}}}"#, i + 1, i * 2, i * 2 + 2))
                .collect();
            fs::write(
                dir.join("script.json"),
                format!(r#"{{"video_id":"{}","title":"{}","shots":[{}]}}"#, id, title, shots.join(",")),
            )
            .unwrap();
            dir
        }

        pub fn drain(&mut self) -> Vec<String> {
            let mut kinds = Vec::new();
            while let Some(message) = self.events.try_recv() {
                kinds.push(message.event.kind().to_string());
            }
            kinds
        }
    }

    #[test]
    fn manifest_paths_resolve_to_their_task() {
        let mut fx = Fixture::new();
        let dir = fx.task_dir("vid_1", "Launch", 1);
        fx.registry.start_monitoring("vid_1", &dir).unwrap();

        assert_eq!(fx.registry.task_for_manifest(&dir.join("script.json")), Some("vid_1".to_string()));
        assert_eq!(fx.registry.task_for_manifest(&dir.join("shot_01.jpg")), None);
        assert_eq!(fx.registry.task_for_manifest(&dir.join("sub/script.json")), None);
        assert_eq!(fx.registry.watch_path("vid_1"), Some(dir.as_path()));
    }
}
