use serde::Serialize;
use shotwatch_broadcast::{BroadcastHub, Subscription};
use shotwatch_core::{MonitorError, TaskState};
use shotwatch_registry::{SortOrder, TaskSort};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<Result<T, MonitorError>>;

pub(crate) enum Command {
    Start { hint: String, path: PathBuf, reply: Reply<TaskState> },
    Stop { task_id: String, reply: Reply<TaskState> },
    Resume { task_id: String, reply: Reply<TaskState> },
    Get { task_id: String, reply: oneshot::Sender<Option<TaskState>> },
    List { sort: TaskSort, order: SortOrder, reply: oneshot::Sender<Vec<TaskState>> },
    Status { reply: oneshot::Sender<MonitorStatus> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Point-in-time counters of a running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub tasks: usize,
    /// Directories still waiting for their manifest.
    pub pending_discoveries: usize,
    pub subscribers: usize,
}

/// Cloneable front door to a running [`crate::MonitorService`].
#[derive(Clone)]
pub struct MonitorHandle {
    cmd_tx: mpsc::Sender<Command>,
    hub: BroadcastHub,
}

impl MonitorHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<Command>, hub: BroadcastHub) -> Self {
        Self { cmd_tx, hub }
    }

    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx.send(build(reply)).await.map_err(|_| MonitorError::ServiceStopped)?;
        rx.await.map_err(|_| MonitorError::ServiceStopped)?
    }

    pub async fn start(&self, hint: impl Into<String>, path: impl Into<PathBuf>) -> Result<TaskState, MonitorError> {
        let (hint, path) = (hint.into(), path.into());
        self.call(|reply| Command::Start { hint, path, reply }).await
    }

    pub async fn stop(&self, task_id: impl Into<String>) -> Result<TaskState, MonitorError> {
        let task_id = task_id.into();
        self.call(|reply| Command::Stop { task_id, reply }).await
    }

    pub async fn resume(&self, task_id: impl Into<String>) -> Result<TaskState, MonitorError> {
        let task_id = task_id.into();
        self.call(|reply| Command::Resume { task_id, reply }).await
    }

    pub async fn task(&self, task_id: impl Into<String>) -> Result<Option<TaskState>, MonitorError> {
        let (reply, rx) = oneshot::channel();
        let cmd = Command::Get { task_id: task_id.into(), reply };
        self.cmd_tx.send(cmd).await.map_err(|_| MonitorError::ServiceStopped)?;
        rx.await.map_err(|_| MonitorError::ServiceStopped)
    }

    pub async fn tasks(&self, sort: TaskSort, order: SortOrder) -> Result<Vec<TaskState>, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx.send(Command::List { sort, order, reply }).await.map_err(|_| MonitorError::ServiceStopped)?;
        rx.await.map_err(|_| MonitorError::ServiceStopped)
    }

    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    pub async fn status(&self) -> Result<MonitorStatus, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx.send(Command::Status { reply }).await.map_err(|_| MonitorError::ServiceStopped)?;
        rx.await.map_err(|_| MonitorError::ServiceStopped)
    }

    /// Stops the service and waits until every watch and timer is released.
    /// Calling it again, or after the service ended, is a no-op.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}
