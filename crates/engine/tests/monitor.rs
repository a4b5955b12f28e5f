use shotwatch_broadcast::{HubEvent, HubMessage, Subscription};
use shotwatch_core::MonitorError;
use shotwatch_core::config::AppConfig;
use shotwatch_engine::{MonitorHandle, MonitorService, MonitorStatus, SortOrder, TaskSort};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

fn fast_config(root: &Path) -> AppConfig {
    AppConfig {
        watch_directory: root.to_string_lossy().into_owned(),
        file_debounce_ms: 50,
        dir_debounce_ms: 50,
        file_ready_retries: 20,
        file_ready_delay_ms: 20,
        dir_ready_retries: 20,
        dir_ready_delay_ms: 20,
        discovery_interval_ms: 100,
        discovery_max_attempts: 100,
        ..AppConfig::default()
    }
}

fn write_manifest(dir: &Path, id: &str, title: &str, shots: usize) {
    let shots: Vec<String> = (1..=shots).map(|i| format!(r#"{{"shot_id":"s{}"}}"#, i)).collect();
    fs::write(
        dir.join("script.json"),
        format!(r#"{{"video_id":"{}","title":"{}","shots":[{}]}}"#, id, title, shots.join(",")),
    )
    .unwrap();
}

async fn wait_for(sub: &mut Subscription, what: impl Fn(&HubMessage) -> bool) -> HubMessage {
    timeout(Duration::from_secs(10), async {
        loop {
            let message = sub.recv().await.expect("hub closed");
            if what(&message) {
                return message;
            }
        }
    })
    .await
    .expect("timed out waiting for a hub message")
}

async fn spawn(root: &Path) -> MonitorHandle {
    spawn_with(fast_config(root)).await
}

async fn spawn_with(config: AppConfig) -> MonitorHandle {
    let (handle, _task) = MonitorService::spawn(&config).await.unwrap();
    handle
}

/// A directory lane wide enough that delete-then-recreate lands in one window.
fn slow_dir_config(root: &Path) -> AppConfig {
    AppConfig { dir_debounce_ms: 400, ..fast_config(root) }
}

async fn wait_status(handle: &MonitorHandle, what: impl Fn(&MonitorStatus) -> bool) -> MonitorStatus {
    timeout(Duration::from_secs(10), async {
        loop {
            let status = handle.status().await.unwrap();
            if what(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("timed out waiting for the service status")
}

fn recreate(dir: &Path, id: &str, title: &str, shots: usize) {
    fs::remove_dir_all(dir).unwrap();
    fs::create_dir_all(dir).unwrap();
    write_manifest(dir, id, title, shots);
}

/// Waits for `taskUpdated` on `task_id`, failing if the task is removed first.
async fn wait_for_update(sub: &mut Subscription, task_id: &str) -> shotwatch_core::TaskState {
    let message = wait_for(sub, |m| m.event.task_id() == task_id && m.event.kind() != "fileDeleted").await;
    match message.event {
        HubEvent::TaskUpdated(task) => *task,
        other => panic!("expected taskUpdated, got {:?}", other),
    }
}

#[tokio::test]
async fn startup_scan_loads_existing_tasks() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("data");
    let task_dir = root.join("vid_1");
    fs::create_dir_all(&task_dir).unwrap();
    fs::create_dir_all(root.join("no_manifest")).unwrap();
    write_manifest(&task_dir, "vid_1", "Launch", 1);
    fs::write(task_dir.join("shot_01.jpg"), b"jpeg").unwrap();

    let handle = spawn(&root).await;
    let tasks = handle.tasks(TaskSort::default(), SortOrder::default()).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].task_id, "vid_1");
    assert_eq!(tasks[0].title, "Launch");
    assert_eq!(tasks[0].shots[0].assets.len(), 1);
    assert!(handle.task("no_manifest").await.unwrap().is_none());

    handle.shutdown().await;
}

#[tokio::test]
async fn file_changes_reach_subscribers() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("data");
    let task_dir = root.join("vid_1");
    fs::create_dir_all(&task_dir).unwrap();
    write_manifest(&task_dir, "vid_1", "Launch", 2);

    let handle = spawn(&root).await;
    let mut sub = handle.subscribe();

    fs::write(task_dir.join("shot_02.jpg"), b"first").unwrap();
    let added = wait_for(&mut sub, |m| matches!(m.event, HubEvent::FileAdded(_))).await;
    match added.event {
        HubEvent::FileAdded(asset) => {
            assert_eq!(asset.task_id, "vid_1");
            assert_eq!(asset.file_path, "vid_1/shot_02.jpg");
        }
        other => panic!("unexpected {:?}", other),
    }
    let task = handle.task("vid_1").await.unwrap().unwrap();
    assert_eq!(task.shots[1].assets.len(), 1);

    fs::write(task_dir.join("shot_02.jpg"), b"second take").unwrap();
    wait_for(&mut sub, |m| matches!(m.event, HubEvent::FileModified(_))).await;

    fs::remove_file(task_dir.join("shot_02.jpg")).unwrap();
    wait_for(&mut sub, |m| matches!(m.event, HubEvent::FileDeleted(_))).await;
    let task = handle.task("vid_1").await.unwrap().unwrap();
    assert!(task.assets.is_empty());
    assert!(task.shots[1].assets.is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn new_directories_become_tasks_once_the_manifest_lands() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("data");
    fs::create_dir_all(&root).unwrap();

    let handle = spawn(&root).await;
    let mut sub = handle.subscribe();

    let task_dir = root.join("vid_2");
    fs::create_dir_all(&task_dir).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(handle.task("vid_2").await.unwrap().is_none());

    write_manifest(&task_dir, "vid_2", "Late Arrival", 1);
    let updated = wait_for(&mut sub, |m| m.event.kind() == "taskUpdated" && m.event.task_id() == "vid_2").await;
    match updated.event {
        HubEvent::TaskUpdated(task) => assert_eq!(task.title, "Late Arrival"),
        other => panic!("unexpected {:?}", other),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn removing_a_task_directory_forgets_the_task() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("data");
    let task_dir = root.join("vid_3");
    fs::create_dir_all(&task_dir).unwrap();
    write_manifest(&task_dir, "vid_3", "Doomed", 0);

    let handle = spawn(&root).await;
    let mut sub = handle.subscribe();

    fs::remove_dir_all(&task_dir).unwrap();
    wait_for(&mut sub, |m| matches!(&m.event, HubEvent::TaskRemoved { task_id } if task_id == "vid_3")).await;
    assert!(matches!(handle.stop("vid_3").await, Err(MonitorError::NotFound(_))));

    handle.shutdown().await;
}

#[tokio::test]
async fn commands_report_taxonomy_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("data");
    let task_dir = root.join("vid_4");
    fs::create_dir_all(&task_dir).unwrap();

    let handle = spawn(&root).await;
    assert!(matches!(handle.start("x", "/nonexistent").await, Err(MonitorError::InvalidPath(_))));
    assert!(handle.tasks(TaskSort::Title, SortOrder::Asc).await.unwrap().is_empty());

    let task = handle.start("vid_4", task_dir.clone()).await.unwrap();
    assert_eq!(task.title, "Video task vid_4");
    assert!(!handle.stop("vid_4").await.unwrap().monitoring);
    assert!(handle.resume("vid_4").await.unwrap().monitoring);

    handle.shutdown().await;
    assert!(matches!(handle.stop("vid_4").await, Err(MonitorError::ServiceStopped)));
    handle.shutdown().await;
}

#[tokio::test]
async fn removing_a_directory_cancels_its_discovery_poll() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("data");
    fs::create_dir_all(&root).unwrap();

    let handle = spawn(&root).await;
    let _sub = handle.subscribe();

    let pending_dir = root.join("vid_5");
    fs::create_dir_all(&pending_dir).unwrap();
    let status = wait_status(&handle, |s| s.pending_discoveries == 1).await;
    assert_eq!(status.tasks, 0);
    assert_eq!(status.subscribers, 1);

    fs::remove_dir(&pending_dir).unwrap();
    wait_status(&handle, |s| s.pending_discoveries == 0).await;
    assert!(handle.task("vid_5").await.unwrap().is_none());

    handle.shutdown().await;
    assert!(matches!(handle.status().await, Err(MonitorError::ServiceStopped)));
}

#[tokio::test]
async fn manifest_edits_retitle_the_task() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("data");
    let task_dir = root.join("vid_6");
    fs::create_dir_all(&task_dir).unwrap();
    write_manifest(&task_dir, "vid_6", "Draft", 1);

    let handle = spawn(&root).await;
    let mut sub = handle.subscribe();

    write_manifest(&task_dir, "vid_6", "Final Cut", 3);
    let updated = wait_for(&mut sub, |m| {
        matches!(&m.event, HubEvent::TaskUpdated(task) if task.task_id == "vid_6" && task.title == "Final Cut")
    })
    .await;
    match updated.event {
        HubEvent::TaskUpdated(task) => assert_eq!(task.shots.len(), 3),
        other => panic!("unexpected {:?}", other),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn recreated_task_directory_is_watched_again() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("data");
    let task_dir = root.join("vid_7");
    fs::create_dir_all(&task_dir).unwrap();
    write_manifest(&task_dir, "vid_7", "Original", 1);
    fs::write(task_dir.join("shot_01.jpg"), b"old").unwrap();

    let handle = spawn_with(slow_dir_config(&root)).await;
    let mut sub = handle.subscribe();

    recreate(&task_dir, "vid_7", "Reshoot", 2);
    let task = wait_for_update(&mut sub, "vid_7").await;
    assert_eq!(task.title, "Reshoot");
    assert!(task.assets.is_empty());
    assert!(task.shots.iter().all(|s| s.assets.is_empty()));

    fs::write(task_dir.join("shot_02.jpg"), b"new").unwrap();
    let added = wait_for(&mut sub, |m| matches!(m.event, HubEvent::FileAdded(_))).await;
    match added.event {
        HubEvent::FileAdded(asset) => assert_eq!(asset.file_path, "vid_7/shot_02.jpg"),
        other => panic!("unexpected {:?}", other),
    }
    let task = handle.task("vid_7").await.unwrap().unwrap();
    assert_eq!(task.shots[1].assets.len(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn resume_after_recreation_while_stopped_sees_new_files() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("data");
    let task_dir = root.join("vid_8");
    fs::create_dir_all(&task_dir).unwrap();
    write_manifest(&task_dir, "vid_8", "Paused", 1);

    let handle = spawn_with(slow_dir_config(&root)).await;
    handle.stop("vid_8").await.unwrap();
    let mut sub = handle.subscribe();

    recreate(&task_dir, "vid_8", "Paused", 1);
    let task = wait_for_update(&mut sub, "vid_8").await;
    assert!(!task.monitoring);
    assert!(handle.task("vid_8").await.unwrap().is_some());

    assert!(handle.resume("vid_8").await.unwrap().monitoring);
    fs::write(task_dir.join("shot_01.mp4"), b"clip").unwrap();
    let added = wait_for(&mut sub, |m| matches!(m.event, HubEvent::FileAdded(_))).await;
    assert_eq!(added.event.task_id(), "vid_8");

    handle.shutdown().await;
}
