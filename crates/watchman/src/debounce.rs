//! Per-path debouncing.
//!
//! Every notification for a path replaces that path's pending timer. When a
//! timer fires it reports back over a channel and the owner calls
//! [`Debouncer::take`] to claim the latest kind. Each entry carries a sequence
//! number, so a firing that raced with a newer notification is discarded and
//! the last event for a path always wins.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Added or changed. Add and change collapse into one.
    Upsert,
    Remove,
}

/// Timer expiry for one path.
#[derive(Debug)]
pub struct Fired {
    pub path: PathBuf,
    seq: u64,
}

struct Pending {
    kind: ChangeKind,
    seq: u64,
    timer: JoinHandle<()>,
}

pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Pending>,
    next_seq: u64,
    fired_tx: mpsc::UnboundedSender<Fired>,
}

impl Debouncer {
    pub fn new(window: Duration) -> (Self, mpsc::UnboundedReceiver<Fired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            window,
            pending: HashMap::new(),
            next_seq: 0,
            fired_tx,
        };
        (debouncer, fired_rx)
    }

    /// Records a notification, restarting the quiet window for `path`.
    pub fn push(&mut self, path: PathBuf, kind: ChangeKind) {
        self.next_seq += 1;
        let seq = self.next_seq;

        if let Some(previous) = self.pending.remove(&path) {
            previous.timer.abort();
        }

        let deadline = Instant::now() + self.window;
        let tx = self.fired_tx.clone();
        let fired_path = path.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(Fired { path: fired_path, seq });
        });

        self.pending.insert(path, Pending { kind, seq, timer });
    }

    /// Claims a fired timer. `None` when a newer notification superseded it.
    pub fn take(&mut self, fired: Fired) -> Option<(PathBuf, ChangeKind)> {
        match self.pending.get(&fired.path) {
            Some(pending) if pending.seq == fired.seq => {
                let pending = self.pending.remove(&fired.path)?;
                Some((fired.path, pending.kind))
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.timer.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
