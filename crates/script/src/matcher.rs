//! Binding of files to shots by exact filename.
//!
//! Shot `n` owns `shot_<n>.jpg|mp4`, `shot_<nn>.jpg|mp4`, `audio_<n>.mp3` and
//! `audio_<nn>.mp3`, where `nn` is `n` zero-padded to two digits. Nothing else
//! binds: `shot_1.jpg` never lands on shot 10, and `shot_003.jpg` lands nowhere.

use crate::listing::ListedFile;
use once_cell::sync::Lazy;
use regex::Regex;
use shotwatch_core::classify::{asset_for, is_excluded};
use shotwatch_core::{ShotDetail, ShotSpec};
use std::path::Path;
use tracing::debug;

static VISUAL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^shot_(\d+)\.(?:jpg|mp4)$").unwrap());
static AUDIO_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^audio_(\d+)\.mp3$").unwrap());

const ROLE_REFERENCES: [&str; 3] = ["host.jpg", "guest.jpg", "cover.jpg"];

pub fn is_role_reference(file_name: &str) -> bool {
    ROLE_REFERENCES.contains(&file_name)
}

/// The shot number a file name binds to, if any.
pub fn shot_number_for(file_name: &str) -> Option<u32> {
    if is_role_reference(file_name) {
        return None;
    }
    let caps = VISUAL_NAME.captures(file_name).or_else(|| AUDIO_NAME.captures(file_name))?;
    let digits = caps.get(1)?.as_str();
    let number: u32 = digits.parse().ok()?;

    // Only the plain and two-digit spellings count.
    if digits == number.to_string() || digits == format!("{:02}", number) {
        Some(number)
    } else {
        None
    }
}

pub fn binds_to(file_name: &str, shot_number: u32) -> bool {
    shot_number_for(file_name) == Some(shot_number)
}

/// Builds the full shot list for a task from its manifest shots and the
/// listing of its directory.
pub fn match_shots(task_id: &str, specs: &[ShotSpec], files: &[ListedFile], root: &Path) -> Vec<ShotDetail> {
    let bindable: Vec<(u32, &ListedFile)> = files
        .iter()
        .filter(|file| !is_excluded(Path::new(&file.relative)))
        .filter_map(|file| shot_number_for(&file.file_name).map(|n| (n, file)))
        .collect();

    specs
        .iter()
        .map(|spec| {
            let mut detail = ShotDetail::new(spec.clone(), task_id);
            for (number, file) in &bindable {
                if *number != spec.shot_number {
                    continue;
                }
                if let Some(asset) = asset_for(&file.path, root, file.size, file.created_at) {
                    debug!("🎞️ Shot {} bound {}", spec.shot_id, asset.file_path);
                    detail.upsert_asset(asset);
                }
            }
            detail
        })
        .collect()
}
