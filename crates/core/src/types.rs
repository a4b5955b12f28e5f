use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Audio,
    Video,
    Prompt,
}

/// A classified file belonging to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFile {
    pub file_id: String,
    pub task_id: String,
    pub file_type: FileType,
    /// Relative to the watch root, `/`-separated.
    pub file_path: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub file_size: u64,
}

impl AssetFile {
    pub fn new(
        task_id: impl Into<String>,
        file_type: FileType,
        file_path: impl Into<String>,
        file_name: impl Into<String>,
        created_at: DateTime<Utc>,
        file_size: u64,
    ) -> Self {
        let task_id = task_id.into();
        let file_name = file_name.into();
        Self {
            file_id: format!("{}_{}_{}", task_id, file_name, Utc::now().timestamp_millis()),
            task_id,
            file_type,
            file_path: file_path.into(),
            file_name,
            created_at,
            file_size,
        }
    }
}

/// One manifest-declared timeline segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotSpec {
    pub shot_id: String,
    /// 1-based position in the manifest.
    pub shot_number: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub description: String,
    pub dialogue: String,
    pub role_id: String,
}

/// A shot together with the assets currently bound to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotDetail {
    #[serde(flatten)]
    pub spec: ShotSpec,
    pub task_id: String,
    pub assets: Vec<AssetFile>,
}

impl ShotDetail {
    pub fn new(spec: ShotSpec, task_id: impl Into<String>) -> Self {
        Self { spec, task_id: task_id.into(), assets: Vec::new() }
    }

    pub fn upsert_asset(&mut self, asset: AssetFile) {
        match self.assets.iter_mut().find(|a| a.file_path == asset.file_path) {
            Some(existing) => *existing = asset,
            None => self.assets.push(asset),
        }
    }

    pub fn remove_asset(&mut self, file_path: &str) -> bool {
        let before = self.assets.len();
        self.assets.retain(|a| a.file_path != file_path);
        self.assets.len() != before
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
}

/// One monitored production folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    pub task_id: String,
    pub title: String,
    pub status: TaskStatus,
    pub monitoring: bool,
    pub manifest_path: PathBuf,
    pub assets: Vec<AssetFile>,
    pub shots: Vec<ShotDetail>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub folder_created_at: DateTime<Utc>,
}

impl TaskState {
    pub fn new(task_id: impl Into<String>, manifest_path: PathBuf, folder_created_at: DateTime<Utc>) -> Self {
        let task_id = task_id.into();
        let now = Utc::now();
        Self {
            title: format!("Video task {}", task_id),
            task_id,
            status: TaskStatus::Processing,
            monitoring: true,
            manifest_path,
            assets: Vec::new(),
            shots: Vec::new(),
            created_at: now,
            updated_at: now,
            folder_created_at,
        }
    }

    pub fn asset(&self, file_path: &str) -> Option<&AssetFile> {
        self.assets.iter().find(|a| a.file_path == file_path)
    }

    /// Inserts or replaces by `file_path`. Returns true when the path was
    /// already present.
    pub fn upsert_asset(&mut self, asset: AssetFile) -> bool {
        match self.assets.iter_mut().find(|a| a.file_path == asset.file_path) {
            Some(existing) => {
                *existing = asset;
                true
            }
            None => {
                self.assets.push(asset);
                false
            }
        }
    }

    pub fn remove_asset(&mut self, file_path: &str) -> Option<AssetFile> {
        let index = self.assets.iter().position(|a| a.file_path == file_path)?;
        Some(self.assets.remove(index))
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
