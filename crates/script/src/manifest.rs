use serde::{Deserialize, Serialize};
use serde_json::Value;
use shotwatch_core::ShotSpec;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest is missing required field `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { sample_rate: 44100, channels: 2 }
    }
}

/// Parsed per-task `script.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub video_id: String,
    pub title: String,
    pub shots: Vec<ShotSpec>,
    pub audio_config: AudioConfig,
}

/// First non-empty string among `keys`. Numbers are accepted for ids.
fn first_str(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match &obj[*key] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First non-zero number among `keys`, or 0.
fn first_secs(obj: &Value, keys: &[&str]) -> f64 {
    keys.iter()
        .filter_map(|key| obj[*key].as_f64())
        .find(|v| *v != 0.0)
        .unwrap_or(0.0)
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let data: Value = serde_json::from_str(content)?;

        let video_id = first_str(&data, &["video_id", "videoId"]).ok_or(ManifestError::MissingField("videoId"))?;
        let title = first_str(&data, &["title"]).ok_or(ManifestError::MissingField("title"))?;

        let shots = data["shots"]
            .as_array()
            .map(|shots| {
                shots
                    .iter()
                    .enumerate()
                    .map(|(index, shot)| ShotSpec {
                        shot_id: first_str(shot, &["shot_id", "shotId"]).unwrap_or_else(|| format!("shot_{}", index + 1)),
                        shot_number: index as u32 + 1,
                        start_time: first_secs(shot, &["start_sec", "startTime"]),
                        end_time: first_secs(shot, &["end_sec", "endTime"]),
                        description: first_str(shot, &["description"]).unwrap_or_default(),
                        dialogue: first_str(shot, &["dialogue"]).unwrap_or_default(),
                        role_id: first_str(shot, &["role_id", "roleId"]).unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let audio_config = match &data["audioConfig"] {
            Value::Object(_) => {
                let defaults = AudioConfig::default();
                let audio = &data["audioConfig"];
                AudioConfig {
                    sample_rate: audio["sampleRate"].as_u64().map(|v| v as u32).unwrap_or(defaults.sample_rate),
                    channels: audio["channels"].as_u64().map(|v| v as u16).unwrap_or(defaults.channels),
                }
            }
            _ => AudioConfig::default(),
        };

        Ok(Self { video_id, title, shots, audio_config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snake_case_manifest() {
        let manifest = Manifest::from_json(
            r#"{
                "video_id": "vid_1",
                "title": "Morning Show",
                "shots": [
                    {"shot_id": "intro", "start_sec": 0, "end_sec": 4.5, "description": "wide", "dialogue": "hi", "role_id": "host"},
                    {"start_sec": 4.5, "end_sec": 9}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.video_id, "vid_1");
        assert_eq!(manifest.title, "Morning Show");
        assert_eq!(manifest.shots.len(), 2);
        assert_eq!(manifest.shots[0].shot_id, "intro");
        assert_eq!(manifest.shots[0].role_id, "host");
        assert_eq!(manifest.shots[0].end_time, 4.5);
        assert_eq!(manifest.shots[1].shot_id, "shot_2");
        assert_eq!(manifest.shots[1].shot_number, 2);
        assert_eq!(manifest.shots[1].dialogue, "");
        assert_eq!(manifest.audio_config, AudioConfig::default());
    }

    #[test]
    fn accepts_camel_case_aliases_and_audio_config() {
        let manifest = Manifest::from_json(
            r#"{
                "videoId": "vid_2",
                "title": "Interview",
                "shots": [{"shotId": "a", "startTime": 1, "endTime": 2, "roleId": "guest"}],
                "audioConfig": {"sampleRate": 48000}
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.video_id, "vid_2");
        assert_eq!(manifest.shots[0].shot_id, "a");
        assert_eq!(manifest.shots[0].start_time, 1.0);
        assert_eq!(manifest.shots[0].role_id, "guest");
        assert_eq!(manifest.audio_config.sample_rate, 48000);
        assert_eq!(manifest.audio_config.channels, 2);
    }

    #[test]
    fn rejects_missing_required_fields() {
        assert!(matches!(
            Manifest::from_json(r#"{"title": "x"}"#),
            Err(ManifestError::MissingField("videoId"))
        ));
        assert!(matches!(
            Manifest::from_json(r#"{"video_id": "x", "title": ""}"#),
            Err(ManifestError::MissingField("title"))
        ));
        assert!(matches!(Manifest::from_json("{not json"), Err(ManifestError::Json(_))));
    }

    #[test]
    fn missing_shots_is_an_empty_list() {
        let manifest = Manifest::from_json(r#"{"video_id": "x", "title": "t"}"#).unwrap();
        assert!(manifest.shots.is_empty());
    }
}
