use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Root whose immediate children are candidate tasks.
    #[serde(alias = "WATCH_DIRECTORY")]
    pub watch_directory: String,

    #[serde(alias = "MANIFEST_NAME")]
    pub manifest_name: String,

    #[serde(alias = "FILE_DEBOUNCE_MS")]
    pub file_debounce_ms: u64,

    #[serde(alias = "DIR_DEBOUNCE_MS")]
    pub dir_debounce_ms: u64,

    #[serde(alias = "FILE_READY_RETRIES")]
    pub file_ready_retries: u32,

    #[serde(alias = "FILE_READY_DELAY_MS")]
    pub file_ready_delay_ms: u64,

    #[serde(alias = "DIR_READY_RETRIES")]
    pub dir_ready_retries: u32,

    #[serde(alias = "DIR_READY_DELAY_MS")]
    pub dir_ready_delay_ms: u64,

    #[serde(alias = "DISCOVERY_INTERVAL_MS")]
    pub discovery_interval_ms: u64,

    #[serde(alias = "DISCOVERY_MAX_ATTEMPTS")]
    pub discovery_max_attempts: u32,

    #[serde(alias = "TASK_WATCH_DEPTH")]
    pub task_watch_depth: usize,

    #[serde(alias = "BROADCAST_CAPACITY")]
    pub broadcast_capacity: usize,

    #[serde(alias = "LOG_FILE")]
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch_directory: "./data".to_string(),
            manifest_name: "script.json".to_string(),
            file_debounce_ms: 300,
            dir_debounce_ms: 500,
            file_ready_retries: 5,
            file_ready_delay_ms: 100,
            dir_ready_retries: 10,
            dir_ready_delay_ms: 200,
            discovery_interval_ms: 5000,
            discovery_max_attempts: 50,
            task_watch_depth: 2,
            broadcast_capacity: 256,
            log_file: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env is fine; the defaults below cover every key.
        let _ = dotenvy::dotenv();

        let d = Self::default();
        let builder = Config::builder()
            .set_default("watch_directory", d.watch_directory)?
            .set_default("manifest_name", d.manifest_name)?
            .set_default("file_debounce_ms", d.file_debounce_ms as i64)?
            .set_default("dir_debounce_ms", d.dir_debounce_ms as i64)?
            .set_default("file_ready_retries", d.file_ready_retries as i64)?
            .set_default("file_ready_delay_ms", d.file_ready_delay_ms as i64)?
            .set_default("dir_ready_retries", d.dir_ready_retries as i64)?
            .set_default("dir_ready_delay_ms", d.dir_ready_delay_ms as i64)?
            .set_default("discovery_interval_ms", d.discovery_interval_ms as i64)?
            .set_default("discovery_max_attempts", d.discovery_max_attempts as i64)?
            .set_default("task_watch_depth", d.task_watch_depth as i64)?
            .set_default("broadcast_capacity", d.broadcast_capacity as i64)?
            .add_source(File::with_name("shotwatch").required(false))
            .add_source(Environment::default());

        builder.build()?.try_deserialize::<Self>()?.validate()
    }

    /// Rejects values the runtime cannot work with.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.discovery_interval_ms == 0 {
            return Err(ConfigError::Message("discovery_interval_ms must be at least 1".into()));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::Message("broadcast_capacity must be at least 1".into()));
        }
        Ok(self)
    }

    /// The watch root as an absolute path, with `~` expanded.
    pub fn watch_root(&self) -> PathBuf {
        crate::path_utils::absolutize(&self.watch_directory)
    }

    pub fn file_debounce(&self) -> Duration {
        Duration::from_millis(self.file_debounce_ms)
    }

    pub fn dir_debounce(&self) -> Duration {
        Duration::from_millis(self.dir_debounce_ms)
    }

    pub fn file_ready_delay(&self) -> Duration {
        Duration::from_millis(self.file_ready_delay_ms)
    }

    pub fn dir_ready_delay(&self) -> Duration {
        Duration::from_millis(self.dir_ready_delay_ms)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_timings() {
        let config = AppConfig::default();
        assert_eq!(config.file_debounce(), Duration::from_millis(300));
        assert_eq!(config.dir_debounce(), Duration::from_millis(500));
        assert_eq!(config.discovery_interval(), Duration::from_secs(5));
        assert_eq!(config.discovery_max_attempts, 50);
        assert_eq!(config.manifest_name, "script.json");
    }

    #[test]
    fn watch_root_is_absolute() {
        let config = AppConfig {
            watch_directory: "relative/data".to_string(),
            ..AppConfig::default()
        };
        let root = config.watch_root();
        assert!(root.is_absolute());
        assert!(root.ends_with("relative/data"));
    }

    #[test]
    fn zero_intervals_and_capacities_are_rejected() {
        let zero_interval = AppConfig { discovery_interval_ms: 0, ..AppConfig::default() };
        let err = zero_interval.validate().unwrap_err();
        assert!(err.to_string().contains("discovery_interval_ms"));

        let zero_capacity = AppConfig { broadcast_capacity: 0, ..AppConfig::default() };
        assert!(zero_capacity.validate().is_err());

        assert!(AppConfig::default().validate().is_ok());
    }
}
