use serde::Deserialize;
use shotwatch_core::TaskState;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskSort {
    CreatedAt,
    #[default]
    FolderCreatedAt,
    /// Case-insensitive.
    Title,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for TaskSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" | "created_at" => Ok(TaskSort::CreatedAt),
            "folderCreatedAt" | "folder_created_at" => Ok(TaskSort::FolderCreatedAt),
            "title" => Ok(TaskSort::Title),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

pub(crate) fn sort_tasks(tasks: &mut [TaskState], sort: TaskSort, order: SortOrder) {
    tasks.sort_by(|a, b| {
        let ordering = match sort {
            TaskSort::CreatedAt => a.created_at.cmp(&b.created_at),
            TaskSort::FolderCreatedAt => a.folder_created_at.cmp(&b.folder_created_at),
            TaskSort::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        }
        .then_with(|| a.task_id.cmp(&b.task_id));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}
