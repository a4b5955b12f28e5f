//! Pure path classification: file types by extension, task identity by
//! position under the watch root, and the hidden/cache exclusion rule.

use crate::path_utils::segments;
use crate::types::{AssetFile, FileType};
use chrono::{DateTime, Utc};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

const CACHE_SEGMENT: &str = "cache";

/// Maps a file name to its asset type by extension (case-insensitive).
pub fn classify_file(name: &str) -> Option<FileType> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "bmp" => Some(FileType::Image),
        "mp3" | "wav" | "ogg" | "aac" => Some(FileType::Audio),
        "mp4" | "avi" | "mov" | "mkv" => Some(FileType::Video),
        "prompt" => Some(FileType::Prompt),
        _ => None,
    }
}

/// Index into `path`'s segments just past the first contiguous occurrence of
/// `root`'s segments.
fn position_after_root(path: &Path, root: &Path) -> Option<(Vec<String>, usize)> {
    let path_segs: Vec<String> = segments(path).iter().map(|s| s.to_string_lossy().into_owned()).collect();
    let root_segs: Vec<String> = segments(root).iter().map(|s| s.to_string_lossy().into_owned()).collect();

    if root_segs.is_empty() {
        return Some((path_segs, 0));
    }
    if root_segs.len() > path_segs.len() {
        return None;
    }

    let start = path_segs
        .windows(root_segs.len())
        .position(|window| window == root_segs.as_slice())?;
    Some((path_segs, start + root_segs.len()))
}

/// The first-level directory name under `root` that `path` lives in.
///
/// `None` when `path` does not contain `root` as a segment sequence or when
/// nothing follows it (the root itself).
pub fn derive_task_id(path: &Path, root: &Path) -> Option<String> {
    let (segs, after) = position_after_root(path, root)?;
    segs.get(after).cloned()
}

/// `path` expressed relative to `root`, using the same segment match as
/// [`derive_task_id`].
pub fn relative_to_root(path: &Path, root: &Path) -> Option<PathBuf> {
    let (segs, after) = position_after_root(path, root)?;
    if after >= segs.len() {
        return None;
    }
    Some(segs[after..].iter().collect())
}

/// Hidden entries (leading dot) and `cache` directories never produce events.
pub fn is_excluded_name(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || name.eq_ignore_ascii_case(CACHE_SEGMENT)
}

/// True when any segment of `relative` is hidden or a cache directory.
pub fn is_excluded(relative: &Path) -> bool {
    segments(relative).into_iter().any(is_excluded_name)
}

/// Builds the asset for a file observed at `path`.
///
/// `None` when the file sits outside `root`, under a hidden or cache segment,
/// or has an extension that is not tracked.
pub fn asset_for(path: &Path, root: &Path, size: u64, created_at: DateTime<Utc>) -> Option<AssetFile> {
    let relative = relative_to_root(path, root)?;
    if is_excluded(&relative) {
        return None;
    }
    let task_id = derive_task_id(path, root)?;
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let file_type = classify_file(&file_name)?;
    let file_path = segments(&relative)
        .iter()
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    Some(AssetFile::new(task_id, file_type, file_path, file_name, created_at, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension_ignoring_case() {
        assert_eq!(classify_file("shot_01.JPG"), Some(FileType::Image));
        assert_eq!(classify_file("cover.jpeg"), Some(FileType::Image));
        assert_eq!(classify_file("audio_01.mp3"), Some(FileType::Audio));
        assert_eq!(classify_file("take.MKV"), Some(FileType::Video));
        assert_eq!(classify_file("shot_01.prompt"), Some(FileType::Prompt));
        assert_eq!(classify_file("script.json"), None);
        assert_eq!(classify_file("README"), None);
    }

    #[test]
    fn task_id_is_first_segment_after_root() {
        let root = Path::new("/data");
        assert_eq!(derive_task_id(Path::new("/data/vid_1/shot_01.jpg"), root), Some("vid_1".into()));
        assert_eq!(derive_task_id(Path::new("/data/vid_1/a/b/c.mp4"), root), Some("vid_1".into()));
        assert_eq!(derive_task_id(Path::new("/data/vid_1"), root), Some("vid_1".into()));
    }

    #[test]
    fn task_id_matches_root_anywhere_in_the_path() {
        let root = Path::new("/srv/custom-watch");
        let path = Path::new("/mnt/srv/custom-watch/video2/shot_001.prompt");
        assert_eq!(derive_task_id(path, root), Some("video2".into()));
    }

    #[test]
    fn task_id_requires_full_segment_match() {
        let root = Path::new("/data");
        assert_eq!(derive_task_id(Path::new("/database/vid_1/x.jpg"), root), None);
        assert_eq!(derive_task_id(Path::new("/other/vid_1"), root), None);
        assert_eq!(derive_task_id(Path::new("/data"), root), None);
    }

    #[test]
    fn relative_path_keeps_everything_below_root() {
        let rel = relative_to_root(Path::new("/data/vid_1/img/shot_01.jpg"), Path::new("/data"));
        assert_eq!(rel, Some(PathBuf::from("vid_1/img/shot_01.jpg")));
        assert_eq!(relative_to_root(Path::new("/data"), Path::new("/data")), None);
    }

    #[test]
    fn builds_assets_relative_to_root() {
        let root = Path::new("/data");
        let asset = asset_for(Path::new("/data/vid_1/shots/shot_02.mp4"), root, 42, Utc::now()).unwrap();
        assert_eq!(asset.task_id, "vid_1");
        assert_eq!(asset.file_type, FileType::Video);
        assert_eq!(asset.file_path, "vid_1/shots/shot_02.mp4");
        assert_eq!(asset.file_name, "shot_02.mp4");
        assert_eq!(asset.file_size, 42);
        assert!(asset.file_id.starts_with("vid_1_shot_02.mp4_"));

        assert!(asset_for(Path::new("/data/vid_1/cache/shot_02.mp4"), root, 1, Utc::now()).is_none());
        assert!(asset_for(Path::new("/data/vid_1/script.json"), root, 1, Utc::now()).is_none());
        assert!(asset_for(Path::new("/elsewhere/vid_1/shot_02.mp4"), root, 1, Utc::now()).is_none());
    }

    #[test]
    fn hidden_and_cache_segments_are_excluded() {
        assert!(is_excluded(Path::new("vid_1/cache/shot_01.jpg")));
        assert!(is_excluded(Path::new("vid_1/Cache/shot_01.jpg")));
        assert!(is_excluded(Path::new("vid_1/.tmp/shot_01.jpg")));
        assert!(is_excluded(Path::new(".DS_Store")));
        assert!(!is_excluded(Path::new("vid_1/cached_shots/shot_01.jpg")));
        assert!(!is_excluded(Path::new("vid_1/shot_01.jpg")));
    }
}
