//! Configuration management.

use crate::error::{Result, VmonError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Persistent configuration for vmon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default filter directive when `RUST_LOG` is not set.
    pub log_level: String,
    /// Address of the Prometheus scrape endpoint; disabled when absent.
    pub metrics_listen: Option<SocketAddr>,
    /// Instance filter registered with performance counters.
    pub perf_instance_glob: String,
    /// Custom queries unread for this long are paused by the collector.
    pub query_idle_secs: u64,
    /// Counter tables unread for this long are dropped by the collector.
    pub counter_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_listen: None,
            perf_instance_glob: "*".to_string(),
            query_idle_secs: 3600,
            counter_idle_secs: 3600,
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_path()
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| VmonError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| VmonError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VmonError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| VmonError::InvalidConfig {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content).map_err(|e| VmonError::IoError { path: path.to_path_buf(), source: e })
    }

    pub fn validate(&self) -> Result<()> {
        if self.perf_instance_glob.is_empty() {
            return Err(VmonError::InvalidConfig {
                reason: "perf_instance_glob must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn query_idle(&self) -> chrono::Duration {
        seconds(self.query_idle_secs)
    }

    pub fn counter_idle(&self) -> chrono::Duration {
        seconds(self.counter_idle_secs)
    }
}

/// Largest second count `chrono::Duration` can hold.
const MAX_SECONDS: i64 = i64::MAX / 1_000;

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(MAX_SECONDS).min(MAX_SECONDS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.perf_instance_glob, "*");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"metrics_listen": "127.0.0.1:9464", "query_idle_secs": 60}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.metrics_listen, Some("127.0.0.1:9464".parse().unwrap()));
        assert_eq!(config.query_idle(), chrono::Duration::seconds(60));
        assert_eq!(config.counter_idle_secs, 3600);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_failure_is_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, VmonError::InvalidConfig { ref reason } if reason.starts_with("Failed to parse config")));
    }

    #[test]
    fn test_empty_glob_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"perf_instance_glob": ""}"#).unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config { log_level: "debug".to_string(), ..Config::default() };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
