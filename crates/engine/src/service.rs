use crate::handle::{Command, MonitorHandle, MonitorStatus};
use anyhow::{Context, Result};
use chrono::Utc;
use shotwatch_broadcast::BroadcastHub;
use shotwatch_core::{MonitorError, TaskState};
use shotwatch_core::classify::{asset_for, derive_task_id};
use shotwatch_core::config::AppConfig;
use shotwatch_registry::TaskRegistry;
use shotwatch_script::task_directories;
use shotwatch_watchman::{
    DiscoveryEvent, DiscoveryMonitor, DiscoveryOutcome, DiscoveryPolicy, PathWatcher, WatchEvent, WatcherSettings,
};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const COMMAND_CAPACITY: usize = 64;
const WATCH_CAPACITY: usize = 256;
const DISCOVERY_CAPACITY: usize = 64;

pub struct MonitorService {
    root: PathBuf,
    registry: TaskRegistry,
    watcher: PathWatcher,
    discovery: DiscoveryMonitor,
}

impl MonitorService {
    /// Creates the watch root if needed, ingests every task directory that
    /// already has a manifest, starts watching the root for new ones and
    /// spawns the event loop.
    pub async fn spawn(config: &AppConfig) -> Result<(MonitorHandle, JoinHandle<()>)> {
        let root = config.watch_root();
        std::fs::create_dir_all(&root).with_context(|| format!("cannot create watch directory {:?}", root))?;
        info!("🎬 Monitor: watch root {:?}", root);

        let hub = BroadcastHub::new(config.broadcast_capacity);
        let (watch_tx, watch_rx) = mpsc::channel(WATCH_CAPACITY);
        let watcher = PathWatcher::start(WatcherSettings::from(config), watch_tx)?;
        let (discovery, discovery_rx) =
            DiscoveryMonitor::new(DiscoveryPolicy::from_config(config, root.clone()), DISCOVERY_CAPACITY);

        let mut service = Self {
            registry: TaskRegistry::new(root.clone(), config.manifest_name.clone(), hub.clone()),
            root,
            watcher,
            discovery,
        };
        service.scan_existing().await?;
        service
            .watcher
            .watch_discovery_root(&service.root)
            .await
            .map_err(|e| anyhow::anyhow!("cannot watch {:?}: {}", service.root, e))?;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let task = tokio::spawn(service.run(cmd_rx, watch_rx, discovery_rx));
        Ok((MonitorHandle::new(cmd_tx, hub), task))
    }

    async fn scan_existing(&mut self) -> Result<()> {
        let dirs = task_directories(&self.root).with_context(|| format!("cannot list {:?}", self.root))?;
        let mut ingested = 0;
        for dir in dirs {
            if self.has_manifest(&dir) {
                self.ingest(&dir).await;
                ingested += 1;
            }
        }
        info!("🎬 Monitor: {} existing tasks loaded", ingested);
        Ok(())
    }

    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut watch_rx: mpsc::Receiver<WatchEvent>,
        mut discovery_rx: mpsc::Receiver<DiscoveryEvent>,
    ) {
        let mut shutdown_reply: Option<oneshot::Sender<()>> = None;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(event) = watch_rx.recv() => self.handle_watch_event(event).await,
                Some(event) = discovery_rx.recv() => self.handle_discovery(event).await,
            }
        }

        self.discovery.cancel_all();
        self.watcher.shutdown().await;
        info!("🛑 Monitor: stopped with {} tasks in memory", self.registry.len());
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { hint, path, reply } => {
                let _ = reply.send(self.start(&hint, &path).await);
            }
            Command::Stop { task_id, reply } => {
                let _ = reply.send(self.registry.stop_monitoring(&task_id));
            }
            Command::Resume { task_id, reply } => {
                let _ = reply.send(self.resume(&task_id).await);
            }
            Command::Get { task_id, reply } => {
                let _ = reply.send(self.registry.get(&task_id).cloned());
            }
            Command::List { sort, order, reply } => {
                let _ = reply.send(self.registry.list(sort, order));
            }
            Command::Status { reply } => {
                let _ = reply.send(MonitorStatus {
                    tasks: self.registry.len(),
                    pending_discoveries: self.discovery.pending(),
                    subscribers: self.registry.hub().subscriber_count(),
                });
            }
            Command::Shutdown { .. } => {}
        }
    }

    /// The watch is registered before the registry records the task.
    async fn start(&mut self, hint: &str, path: &Path) -> Result<TaskState, MonitorError> {
        let (task_id, dir) = self.registry.resolve_task_dir(path)?;
        let was_known = self.registry.contains(&task_id);
        self.watcher.watch_task_dir(&dir).await?;
        self.discovery.cancel(&dir);

        match self.registry.start_monitoring(hint, &dir) {
            Ok(task) => Ok(task),
            Err(e) => {
                if !was_known {
                    self.watcher.unwatch_task_dir(&dir).await;
                }
                Err(e)
            }
        }
    }

    async fn resume(&mut self, task_id: &str) -> Result<TaskState, MonitorError> {
        let dir = self.registry.task_dir(task_id)?;
        self.watcher.watch_task_dir(&dir).await?;
        self.registry.resume_monitoring(task_id)
    }

    /// A known task directory was deleted and recreated within one debounce
    /// window. The old OS watch died with the old directory.
    async fn rewatch(&mut self, task_id: &str, dir: &Path) {
        self.discovery.cancel(dir);
        if let Err(e) = self.watcher.watch_task_dir(dir).await {
            error!("🎬 Monitor: cannot re-watch {:?}: {}", dir, e);
            return;
        }
        if let Err(e) = self.registry.resync_task(task_id) {
            warn!("🎬 Monitor: resync of {} failed: {}", task_id, e);
        }
    }

    async fn ingest(&mut self, dir: &Path) {
        let hint = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if let Err(e) = self.start(&hint, dir).await {
            error!("🎬 Monitor: failed to ingest {:?}: {}", dir, e);
        }
    }

    fn has_manifest(&self, dir: &Path) -> bool {
        dir.join(self.registry.manifest_name()).is_file()
    }

    async fn handle_watch_event(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::FileUpserted { path, size, created_at } => {
                if let Some(task_id) = self.registry.task_for_manifest(&path) {
                    if let Err(e) = self.registry.reload_manifest(&task_id) {
                        warn!("📜 Monitor: manifest reload for {} failed: {}", task_id, e);
                    }
                    return;
                }
                match asset_for(&path, &self.root, size, created_at) {
                    Some(asset) => {
                        self.registry.apply_file_upsert(asset);
                    }
                    None => debug!("🎬 Monitor: ignoring {:?}", path),
                }
            }
            WatchEvent::FileRemoved { path } => {
                if let Some(asset) = asset_for(&path, &self.root, 0, Utc::now()) {
                    self.registry.apply_file_remove(&asset);
                }
            }
            WatchEvent::DirAdded { path } => {
                let Some(task_id) = derive_task_id(&path, &self.root) else {
                    return;
                };
                if self.registry.contains(&task_id) && self.registry.watch_path(&task_id) == Some(path.as_path()) {
                    self.rewatch(&task_id, &path).await;
                } else if self.has_manifest(&path) {
                    self.ingest(&path).await;
                } else {
                    self.discovery.arm(path);
                }
            }
            WatchEvent::DirRemoved { path } => {
                self.discovery.cancel(&path);
                if self.registry.on_directory_removed(&path).is_some() {
                    self.watcher.unwatch_task_dir(&path).await;
                }
            }
        }
    }

    async fn handle_discovery(&mut self, event: DiscoveryEvent) {
        if !self.discovery.settle(&event) {
            return;
        }
        match event.outcome {
            DiscoveryOutcome::ManifestFound => self.ingest(&event.dir).await,
            DiscoveryOutcome::Abandoned => debug!("🔎 Monitor: {:?} abandoned", event.dir),
        }
    }
}
