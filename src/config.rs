//! Daemon configuration.
//!
//! Loaded from a TOML file passed with `--config` (or `CLASSROOMD_CONFIG`).
//! Every field has a default so the daemon runs without any file at all.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, overridden by RUST_LOG.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Periodic JSON dump of the whole store into the workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_snapshot_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_snapshot_file")]
    pub file_name: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_snapshot_interval(),
            file_name: default_snapshot_file(),
        }
    }
}

impl SnapshotConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

fn default_snapshot_interval() -> u64 {
    3
}

fn default_snapshot_file() -> String {
    "classroom-data.json".to_string()
}

/// Records inserted into a workspace whose teacher table is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    #[serde(default = "default_admin_password")]
    pub admin_password: String,

    #[serde(default = "default_true")]
    pub sample_data: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
            sample_data: true,
        }
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
        Self::from_toml(&raw)
            .with_context(|| format!("failed to parse config {}", path.to_string_lossy()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = Config::from_toml("").expect("parse");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.snapshot.enabled);
        assert_eq!(cfg.snapshot.interval_secs, 3);
        assert_eq!(cfg.seed.admin_username, "admin");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml(
            r#"
            [snapshot]
            interval_secs = 0

            [seed]
            sample_data = false
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.snapshot.interval(), Duration::from_secs(1));
        assert_eq!(cfg.snapshot.file_name, "classroom-data.json");
        assert!(cfg.seed.enabled);
        assert!(!cfg.seed.sample_data);
    }
}
