use crate::debounce::{ChangeKind, Debouncer, Fired};
use crate::ignore::WatchRoots;
use crate::readiness::{ProbePolicy, wait_dir_ready, wait_file_ready};
use crate::types::WatchEvent;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use shotwatch_core::MonitorError;
use shotwatch_core::config::AppConfig;
use shotwatch_core::path_utils::birth_time;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

const RAW_CAPACITY: usize = 1024;
const COMMAND_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub file_debounce: Duration,
    pub dir_debounce: Duration,
    pub file_probe: ProbePolicy,
    pub dir_probe: ProbePolicy,
    /// Directory levels below a task root whose files still produce events.
    pub task_depth: usize,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for WatcherSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            file_debounce: config.file_debounce(),
            dir_debounce: config.dir_debounce(),
            file_probe: ProbePolicy { max_retries: config.file_ready_retries, delay: config.file_ready_delay() },
            dir_probe: ProbePolicy { max_retries: config.dir_ready_retries, delay: config.dir_ready_delay() },
            task_depth: config.task_watch_depth,
        }
    }
}

enum WatchCommand {
    WatchTask { path: PathBuf, reply: oneshot::Sender<Result<(), MonitorError>> },
    UnwatchTask { path: PathBuf },
    WatchDiscovery { path: PathBuf, reply: oneshot::Sender<Result<(), MonitorError>> },
    Shutdown,
}

/// Handle to the running watcher pump.
///
/// One OS watcher serves every root; adding a root extends it. Dropping the
/// handle or calling [`PathWatcher::shutdown`] cancels pending debounce timers
/// and readiness checks and releases the OS watches.
pub struct PathWatcher {
    cmd_tx: mpsc::Sender<WatchCommand>,
    task: JoinHandle<()>,
}

impl PathWatcher {
    /// Starts the pump. Events are delivered to `out`.
    pub fn start(settings: WatcherSettings, out: mpsc::Sender<WatchEvent>) -> anyhow::Result<Self> {
        let (raw_tx, raw_rx) = mpsc::channel(RAW_CAPACITY);

        // notify calls back on its own thread, which must never park: watch()
        // and unwatch() wait on that same thread.
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => match raw_tx.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    warn!("👀 Watchman: event backlog full, dropping {:?}", event.paths);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            },
            Err(e) => warn!("👀 Watchman: notification error: {}", e),
        })?;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (files, file_fired) = Debouncer::new(settings.file_debounce);
        let (dirs, dir_fired) = Debouncer::new(settings.dir_debounce);

        let pump = Pump {
            watcher: Arc::new(Mutex::new(watcher)),
            roots: WatchRoots::new(settings.task_depth),
            files,
            dirs,
            settings,
            out,
        };
        let task = tokio::spawn(pump.run(raw_rx, cmd_rx, file_fired, dir_fired));

        Ok(Self { cmd_tx, task })
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<(), MonitorError>>) -> WatchCommand,
    ) -> Result<(), MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx.send(build(reply)).await.map_err(|_| MonitorError::ServiceStopped)?;
        rx.await.map_err(|_| MonitorError::ServiceStopped)?
    }

    /// Watches a task directory recursively. Calling it again for a known
    /// path re-registers the OS watch, which picks up a recreated directory.
    pub async fn watch_task_dir(&self, path: &Path) -> Result<(), MonitorError> {
        let path = path.to_path_buf();
        self.request(|reply| WatchCommand::WatchTask { path, reply }).await
    }

    pub async fn unwatch_task_dir(&self, path: &Path) {
        let _ = self.cmd_tx.send(WatchCommand::UnwatchTask { path: path.to_path_buf() }).await;
    }

    /// Watches the immediate children of the discovery root.
    pub async fn watch_discovery_root(&self, path: &Path) -> Result<(), MonitorError> {
        let path = path.to_path_buf();
        self.request(|reply| WatchCommand::WatchDiscovery { path, reply }).await
    }

    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(WatchCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

/// Whether a raw notification names a file, a directory, or we cannot tell.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Entry {
    File,
    Dir,
    Unknown,
}

struct Pump {
    watcher: Arc<Mutex<RecommendedWatcher>>,
    roots: WatchRoots,
    files: Debouncer,
    dirs: Debouncer,
    settings: WatcherSettings,
    out: mpsc::Sender<WatchEvent>,
}

impl Pump {
    async fn run(
        mut self,
        mut raw_rx: mpsc::Receiver<Event>,
        mut cmd_rx: mpsc::Receiver<WatchCommand>,
        mut file_fired: mpsc::UnboundedReceiver<Fired>,
        mut dir_fired: mpsc::UnboundedReceiver<Fired>,
    ) {
        let mut inflight: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(WatchCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(event) = raw_rx.recv() => self.route(event),
                Some(fired) = file_fired.recv() => {
                    if let Some((path, kind)) = self.files.take(fired) {
                        self.dispatch_file(path, kind, &mut inflight);
                    }
                }
                Some(fired) = dir_fired.recv() => {
                    if let Some((path, kind)) = self.dirs.take(fired) {
                        self.dispatch_dir(path, kind, &mut inflight);
                    }
                }
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            warn!("👀 Watchman: event delivery panicked: {}", e);
                        }
                    }
                }
            }
        }

        if !self.files.is_empty() || !self.dirs.is_empty() {
            debug!("👀 Watchman: discarding {} pending changes", self.files.len() + self.dirs.len());
        }
        self.files.cancel_all();
        self.dirs.cancel_all();
        inflight.abort_all();
        drop(raw_rx);
        info!("👀 Watchman: stopped");
    }

    /// Runs a notify call on the blocking pool. Recursive watches walk the
    /// whole tree and inotify round-trips through notify's own thread.
    async fn os_call<F>(&self, call: F) -> notify::Result<()>
    where
        F: FnOnce(&mut RecommendedWatcher) -> notify::Result<()> + Send + 'static,
    {
        let watcher = Arc::clone(&self.watcher);
        tokio::task::spawn_blocking(move || {
            let mut watcher = watcher.lock().map_err(|_| notify::Error::generic("watcher lock poisoned"))?;
            call(&mut watcher)
        })
        .await
        .map_err(|e| notify::Error::generic(&e.to_string()))?
    }

    async fn handle_command(&mut self, cmd: WatchCommand) {
        match cmd {
            WatchCommand::WatchTask { path, reply } => {
                let known = self.roots.has_task_root(&path);
                let target = path.clone();
                let result = self
                    .os_call(move |watcher| {
                        if known {
                            // The old watch may point at a directory that no longer exists.
                            let _ = watcher.unwatch(&target);
                        }
                        watcher.watch(&target, RecursiveMode::Recursive)
                    })
                    .await;
                let result = match result {
                    Ok(()) => {
                        self.roots.add_task_root(&path);
                        if known {
                            info!("👀 Watchman: re-registered task directory {:?}", path);
                        } else {
                            info!("👀 Watchman: watching task directory {:?}", path);
                        }
                        Ok(())
                    }
                    Err(e) => {
                        self.roots.remove_task_root(&path);
                        Err(MonitorError::Watch(e.to_string()))
                    }
                };
                let _ = reply.send(result);
            }
            WatchCommand::UnwatchTask { path } => {
                if self.roots.remove_task_root(&path) {
                    let target = path.clone();
                    // The OS usually drops the watch with the directory itself.
                    if let Err(e) = self.os_call(move |watcher| watcher.unwatch(&target)).await {
                        debug!("👀 Watchman: unwatch {:?}: {}", path, e);
                    }
                }
            }
            WatchCommand::WatchDiscovery { path, reply } => {
                let result = match self.roots.discovery_root() {
                    Some(existing) => {
                        if existing != path.as_path() {
                            warn!("👀 Watchman: discovery root already set to {:?}, ignoring {:?}", existing, path);
                        }
                        Ok(())
                    }
                    None => {
                        let target = path.clone();
                        match self.os_call(move |watcher| watcher.watch(&target, RecursiveMode::NonRecursive)).await {
                            Ok(()) => {
                                self.roots.set_discovery_root(&path);
                                info!("👀 Watchman: watching discovery root {:?}", path);
                                Ok(())
                            }
                            Err(e) => Err(MonitorError::Watch(e.to_string())),
                        }
                    }
                };
                let _ = reply.send(result);
            }
            WatchCommand::Shutdown => {}
        }
    }

    fn route(&mut self, event: Event) {
        match event.kind {
            EventKind::Create(kind) => {
                let entry = match kind {
                    CreateKind::File => Entry::File,
                    CreateKind::Folder => Entry::Dir,
                    _ => Entry::Unknown,
                };
                for path in event.paths {
                    self.observe(path, ChangeKind::Upsert, entry);
                }
            }
            EventKind::Modify(ModifyKind::Name(mode)) => {
                let mut paths = event.paths.into_iter();
                match mode {
                    RenameMode::From => paths.for_each(|p| self.observe(p, ChangeKind::Remove, Entry::Unknown)),
                    RenameMode::To => paths.for_each(|p| self.observe(p, ChangeKind::Upsert, Entry::Unknown)),
                    RenameMode::Both => {
                        if let Some(from) = paths.next() {
                            self.observe(from, ChangeKind::Remove, Entry::Unknown);
                        }
                        if let Some(to) = paths.next() {
                            self.observe(to, ChangeKind::Upsert, Entry::Unknown);
                        }
                    }
                    _ => paths.for_each(|p| {
                        let kind = if p.exists() { ChangeKind::Upsert } else { ChangeKind::Remove };
                        self.observe(p, kind, Entry::Unknown)
                    }),
                }
            }
            EventKind::Modify(ModifyKind::Metadata(_)) => {}
            EventKind::Modify(_) => {
                for path in event.paths {
                    self.observe(path, ChangeKind::Upsert, Entry::File);
                }
            }
            EventKind::Remove(kind) => {
                let entry = match kind {
                    RemoveKind::File => Entry::File,
                    RemoveKind::Folder => Entry::Dir,
                    _ => Entry::Unknown,
                };
                for path in event.paths {
                    self.observe(path, ChangeKind::Remove, entry);
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }
    }

    fn observe(&mut self, path: PathBuf, kind: ChangeKind, entry: Entry) {
        // For creates we can ask the filesystem; a vanished path is left to the readiness check.
        let entry = match (entry, kind) {
            (Entry::Unknown, ChangeKind::Upsert) if path.is_dir() => Entry::Dir,
            (Entry::Unknown, ChangeKind::Upsert) => Entry::File,
            (known, _) => known,
        };

        if entry != Entry::File && self.roots.is_discovery_child(&path) {
            self.dirs.push(path.clone(), kind);
        }
        if entry != Entry::Dir && self.roots.accepts_file(&path) {
            self.files.push(path, kind);
        }
    }

    fn dispatch_file(&self, path: PathBuf, kind: ChangeKind, inflight: &mut JoinSet<()>) {
        let out = self.out.clone();
        let policy = self.settings.file_probe;
        match kind {
            ChangeKind::Upsert => {
                inflight.spawn(async move {
                    match wait_file_ready(&path, policy).await {
                        Ok(meta) => {
                            let event = WatchEvent::FileUpserted {
                                size: meta.len(),
                                created_at: birth_time(&meta),
                                path,
                            };
                            let _ = out.send(event).await;
                        }
                        Err(e) => info!("👀 Watchman: dropping file event: {}", e),
                    }
                });
            }
            ChangeKind::Remove => {
                inflight.spawn(async move {
                    let _ = out.send(WatchEvent::FileRemoved { path }).await;
                });
            }
        }
    }

    fn dispatch_dir(&self, path: PathBuf, kind: ChangeKind, inflight: &mut JoinSet<()>) {
        let out = self.out.clone();
        let policy = self.settings.dir_probe;
        match kind {
            ChangeKind::Upsert => {
                inflight.spawn(async move {
                    match wait_dir_ready(&path, policy).await {
                        Ok(()) => {
                            let _ = out.send(WatchEvent::DirAdded { path }).await;
                        }
                        Err(e) => info!("👀 Watchman: dropping directory event: {}", e),
                    }
                });
            }
            ChangeKind::Remove => {
                inflight.spawn(async move {
                    let _ = out.send(WatchEvent::DirRemoved { path }).await;
                });
            }
        }
    }
}
