//! Manifest polling for directories that appear without one.
//!
//! A freshly created task folder is usually populated after the directory
//! itself shows up. Each such directory gets a poll task that checks for the
//! manifest at a fixed interval and reports `ManifestFound` or, once the
//! attempt budget is spent, `Abandoned`.

use shotwatch_core::config::AppConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::info;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct DiscoveryPolicy {
    /// The watch root. It never arms a poll itself.
    pub root: PathBuf,
    pub manifest_name: String,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl DiscoveryPolicy {
    pub fn from_config(config: &AppConfig, root: PathBuf) -> Self {
        Self {
            root,
            manifest_name: config.manifest_name.clone(),
            interval: config.discovery_interval().max(MIN_INTERVAL),
            max_attempts: config.discovery_max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    ManifestFound,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryEvent {
    pub dir: PathBuf,
    pub outcome: DiscoveryOutcome,
    seq: u64,
}

struct Poll {
    seq: u64,
    task: JoinHandle<()>,
}

pub struct DiscoveryMonitor {
    policy: DiscoveryPolicy,
    polls: HashMap<PathBuf, Poll>,
    next_seq: u64,
    tx: mpsc::Sender<DiscoveryEvent>,
}

impl DiscoveryMonitor {
    pub fn new(policy: DiscoveryPolicy, capacity: usize) -> (Self, mpsc::Receiver<DiscoveryEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let monitor = Self {
            policy,
            polls: HashMap::new(),
            next_seq: 0,
            tx,
        };
        (monitor, rx)
    }

    /// Starts polling `dir`, restarting the budget if it was already pending.
    /// Returns false for the watch root itself.
    pub fn arm(&mut self, dir: PathBuf) -> bool {
        if dir == self.policy.root {
            return false;
        }
        self.cancel(&dir);

        self.next_seq += 1;
        let seq = self.next_seq;
        info!(
            "🔎 Discovery: {:?} has no {}, polling every {:?}",
            dir, self.policy.manifest_name, self.policy.interval
        );
        let task = tokio::spawn(poll_for_manifest(dir.clone(), self.policy.clone(), seq, self.tx.clone()));
        self.polls.insert(dir, Poll { seq, task });
        true
    }

    /// Retires the poll an event came from. False when the event is stale
    /// (the directory was re-armed or cancelled since).
    pub fn settle(&mut self, event: &DiscoveryEvent) -> bool {
        match self.polls.get(&event.dir) {
            Some(poll) if poll.seq == event.seq => {
                self.polls.remove(&event.dir);
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self, dir: &Path) -> bool {
        match self.polls.remove(dir) {
            Some(poll) => {
                poll.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, poll) in self.polls.drain() {
            poll.task.abort();
        }
    }

    pub fn pending(&self) -> usize {
        self.polls.len()
    }
}

impl Drop for DiscoveryMonitor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn poll_for_manifest(dir: PathBuf, policy: DiscoveryPolicy, seq: u64, tx: mpsc::Sender<DiscoveryEvent>) {
    let manifest = dir.join(&policy.manifest_name);
    // A zero period would panic inside the ticker.
    let period = policy.interval.max(MIN_INTERVAL);
    let mut ticker = interval_at(Instant::now() + period, period);

    for attempt in 1..=policy.max_attempts {
        ticker.tick().await;
        if manifest.is_file() {
            info!("🔎 Discovery: found {:?} after {} checks", manifest, attempt);
            let _ = tx.send(DiscoveryEvent { dir, outcome: DiscoveryOutcome::ManifestFound, seq }).await;
            return;
        }
    }

    info!(
        "🔎 Discovery: {:?} produced no {} within {:?}, giving up",
        dir,
        policy.manifest_name,
        period * policy.max_attempts
    );
    let _ = tx.send(DiscoveryEvent { dir, outcome: DiscoveryOutcome::Abandoned, seq }).await;
}
