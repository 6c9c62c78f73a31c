use crate::collectors::profile::HostProfile;
use crate::dashboard::DashboardOptions;
use crate::gate::PageLocation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub page_url: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    #[serde(default)]
    pub probe: ProbeKind,
    #[serde(default)]
    pub host_profile: HostProfile,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    #[default]
    System,
    Profile,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "page_url is required".to_string(),
            ));
        }
        if let Err(err) = PageLocation::parse(&self.page_url) {
            return Err(ConfigError::Validation(err.to_string()));
        }
        if self.interval_ms < 100 {
            return Err(ConfigError::Validation(
                "interval_ms must be >= 100".to_string(),
            ));
        }
        if self.query_timeout_ms < 1 {
            return Err(ConfigError::Validation(
                "query_timeout_ms must be >= 1".to_string(),
            ));
        }
        if self.history_capacity < 2 {
            return Err(ConfigError::Validation(
                "history_capacity must be >= 2".to_string(),
            ));
        }
        if self.trend_window < 1 {
            return Err(ConfigError::Validation(
                "trend_window must be >= 1".to_string(),
            ));
        }
        validate_host_profile(&self.host_profile)?;

        Ok(())
    }

    pub fn dashboard_options(&self) -> DashboardOptions {
        DashboardOptions {
            interval: Duration::from_millis(self.interval_ms),
            query_timeout: Duration::from_millis(self.query_timeout_ms),
            history_capacity: self.history_capacity,
            trend_window: self.trend_window,
        }
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_host_profile(profile: &HostProfile) -> Result<(), ConfigError> {
    if let Some(heap) = &profile.heap {
        if heap.total_bytes == 0 {
            return Err(ConfigError::Validation(
                "host_profile.heap.total_bytes must be > 0".to_string(),
            ));
        }
    }
    if let Some(conn) = &profile.connection {
        if conn.rtt_ms < 0.0 || conn.downlink_mbps < 0.0 {
            return Err(ConfigError::Validation(
                "host_profile.connection rtt_ms and downlink_mbps must be >= 0".to_string(),
            ));
        }
    }
    if profile.screen.pixel_ratio <= 0.0 {
        return Err(ConfigError::Validation(
            "host_profile.screen.pixel_ratio must be > 0".to_string(),
        ));
    }
    Ok(())
}

const fn default_interval_ms() -> u64 {
    2000
}

const fn default_query_timeout_ms() -> u64 {
    1000
}

const fn default_history_capacity() -> usize {
    crate::history::DEFAULT_CAPACITY
}

const fn default_trend_window() -> usize {
    crate::history::DEFAULT_TREND_WINDOW
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::profile::StorageProfile;

    fn valid_config() -> Config {
        serde_yaml::from_str("page_url: http://localhost:3000/").unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = valid_config();
        cfg.validate().expect("minimal config should be valid");
        assert_eq!(cfg.interval_ms, 2000);
        assert_eq!(cfg.history_capacity, 50);
        assert_eq!(cfg.trend_window, 10);
        assert_eq!(cfg.probe, ProbeKind::System);
        assert!(cfg.enabled.is_none());
    }

    #[test]
    fn bundled_example_is_valid() {
        let cfg: Config = serde_yaml::from_str(Config::example_yaml()).unwrap();
        cfg.validate().expect("example config should be valid");
        assert_eq!(cfg.probe, ProbeKind::Profile);
        assert!(matches!(
            cfg.host_profile.storage,
            Some(StorageProfile::Available { .. })
        ));
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = valid_config();
        cfg.page_url = "not a url".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        let mut cfg = valid_config();
        cfg.history_capacity = 1;
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        let mut cfg = valid_config();
        cfg.interval_ms = 10;
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        let mut cfg = valid_config();
        cfg.host_profile.screen.pixel_ratio = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load_from_file("/nonexistent/devpulse.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
