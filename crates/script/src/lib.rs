//! Shotwatch Script - manifest parsing and shot binding
//!
//! This crate is organized into:
//! - manifest: `script.json` parsing with tolerant field aliases
//! - matcher: exact filename binding of assets to shots
//! - listing: iterative directory walks and candidate task discovery

pub mod manifest;
pub mod matcher;
pub mod listing;

pub use listing::{CandidateDir, ListedFile, list_files, scan_candidates, task_directories};
pub use manifest::{AudioConfig, Manifest, ManifestError};
pub use matcher::{binds_to, match_shots, shot_number_for};
