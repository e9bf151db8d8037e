//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `monitor.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: where the console listens.
//!     - StorageConfig: where the persisted key-value store lives.
//!     - LoggingConfig: default tracing filter.
//!     - AuthConfig: the single demo operator and token lifetime.
//!     - TelemetryConfig: window size, tick interval bounds, sensor ranges.
//!     - StatusConfig: how often the public status badge is redrawn.
//!
//! every section and field has a default, so a partial file is fine.
//!
//! ==============================================================================

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::telemetry::SensorRanges;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub telemetry: TelemetryConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// json file backing the store; in-memory when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub user_id: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub token_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_id: "op-001".to_string(),
            email: "operator@pipeline.local".to_string(),
            password: "pipeline".to_string(),
            display_name: "Control Room Operator".to_string(),
            token_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    pub window_size: usize,
    /// inclusive lower bound of the per-view tick interval
    pub min_interval_ms: u64,
    /// exclusive upper bound of the per-view tick interval
    pub max_interval_ms: u64,
    pub ranges: SensorRanges,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            min_interval_ms: 2000,
            max_interval_ms: 5000,
            ranges: SensorRanges::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StatusConfig {
    pub period_seconds: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { period_seconds: 15 }
    }
}

/// where the running configuration came from
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigOrigin {
    /// `None` means built-in defaults
    pub loaded_from: Option<PathBuf>,
    /// candidates that existed but did not load
    pub failures: Vec<(PathBuf, String)>,
}

impl ConfigOrigin {
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self { loaded_from: Some(path.as_ref().to_path_buf()), failures: Vec::new() }
    }

    pub fn log(&self) {
        for (path, error) in &self.failures {
            tracing::warn!("[CONFIG] Failed to load {}: {}", path.display(), error);
        }
        match &self.loaded_from {
            Some(path) => tracing::info!("[CONFIG] Loaded from {}", path.display()),
            None => tracing::warn!("[CONFIG] No usable config file - using defaults"),
        }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: HostConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let t = &self.telemetry;
        if t.window_size == 0 {
            anyhow::bail!("telemetry.window_size must be at least 1");
        }
        if t.min_interval_ms == 0 || t.max_interval_ms <= t.min_interval_ms {
            anyhow::bail!(
                "telemetry interval bounds [{}, {}) are empty",
                t.min_interval_ms,
                t.max_interval_ms
            );
        }
        for metric in crate::domain::Metric::ALL {
            let range = t.ranges.get(metric);
            if range.min > range.max {
                anyhow::bail!("telemetry range for {} has min > max", metric);
            }
        }
        if self.status.period_seconds == 0 {
            anyhow::bail!("status.period_seconds must be at least 1");
        }
        Ok(())
    }

    /// Load with default fallback; the caller logs the returned origin
    pub fn load_or_default() -> (Self, ConfigOrigin) {
        let paths = [
            PathBuf::from("config").join("monitor.toml"),
            PathBuf::from("..").join("config").join("monitor.toml"),
        ];
        Self::load_first(&paths)
    }

    /// first candidate that exists and parses, otherwise defaults
    pub fn load_first(candidates: &[PathBuf]) -> (Self, ConfigOrigin) {
        let mut failures = Vec::new();
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load(path) {
                Ok(config) => {
                    return (config, ConfigOrigin { loaded_from: Some(path.clone()), failures });
                }
                Err(e) => failures.push((path.clone(), format!("{:#}", e))),
            }
        }
        (Self::default(), ConfigOrigin { loaded_from: None, failures })
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            bind = %self.server.bind,
            storage = %self.storage.path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "memory".to_string()),
            log_level = %self.logging.level,
            operator = %self.auth.email,
            window = self.telemetry.window_size,
            interval_ms = %format!("{}..{}", self.telemetry.min_interval_ms, self.telemetry.max_interval_ms),
            "[CONFIG] host configuration"
        );
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MetricRange;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = HostConfig::parse("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert!(config.storage.path.is_none());
        assert_eq!(config.telemetry.window_size, 10);
        assert_eq!(config.telemetry.ranges, SensorRanges::default());
        assert_eq!(config.status.period_seconds, 15);
    }

    #[test]
    fn test_partial_sections() {
        let config = HostConfig::parse(
            r#"
            [server]
            bind = "127.0.0.1:8080"

            [storage]
            path = "state/console.json"

            [telemetry.ranges]
            pressure = { min = 90.0, max = 110.0 }
            flow_rate = { min = 210.0, max = 290.0 }
            "#,
        )
        .unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.storage.path, Some(PathBuf::from("state/console.json")));
        assert_eq!(config.telemetry.ranges.pressure, MetricRange::new(90.0, 110.0));
        assert_eq!(config.telemetry.ranges.flow_rate, MetricRange::new(210.0, 290.0));
        assert_eq!(config.telemetry.ranges.humidity, MetricRange::new(40.0, 60.0));
        assert_eq!(config.auth.token_ttl_seconds, 3600);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(HostConfig::parse("[telemetry]\nwindow_size = 0").is_err());
        assert!(HostConfig::parse("[telemetry]\nmin_interval_ms = 5000\nmax_interval_ms = 2000").is_err());
        assert!(HostConfig::parse("[telemetry.ranges]\nhumidity = { min = 60.0, max = 40.0 }").is_err());
        assert!(HostConfig::parse("[server\nbind=").is_err());
    }

    #[test]
    fn test_load_first_reports_origin() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("good.toml");
        std::fs::write(&broken, "[server\nbind=").unwrap();
        std::fs::write(&good, "[server]\nbind = \"127.0.0.1:9000\"").unwrap();

        let (config, origin) = HostConfig::load_first(&[missing.clone(), broken.clone(), good.clone()]);
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(origin.loaded_from, Some(good));
        assert_eq!(origin.failures.len(), 1);
        assert_eq!(origin.failures[0].0, broken);
        assert!(origin.failures[0].1.contains("Failed to parse config"));

        // nothing usable: defaults, and the broken file is still reported
        let (config, origin) = HostConfig::load_first(&[missing, broken.clone()]);
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(origin.loaded_from, None);
        assert_eq!(origin.failures.iter().map(|f| &f.0).collect::<Vec<_>>(), vec![&broken]);
    }
}
