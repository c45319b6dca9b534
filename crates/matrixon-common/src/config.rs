//! Configuration module for Matrixon Timeline
//!
//! Values are layered the same way the server binary layers its own
//! configuration: built-in defaults, then an optional TOML file, then
//! `MATRIXON_TIMELINE_*` environment variables.

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{MatrixonError, Result};

/// Prefix for environment overrides, e.g. `MATRIXON_TIMELINE_LOG=debug`.
pub const ENV_PREFIX: &str = "MATRIXON_TIMELINE_";

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-line
    #[default]
    Pretty,
    /// Compact single-line
    Compact,
    /// One JSON object per line
    Json,
}

/// Timeline store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// `EnvFilter` directive, e.g. `info,matrixon_timeline=debug`
    pub log: String,

    /// Log output format
    pub log_format: LogFormat,

    /// Install the Prometheus recorder for the timeline counters
    pub enable_metrics: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            log: "info".to_owned(),
            log_format: LogFormat::default(),
            enable_metrics: false,
        }
    }
}

impl TimelineConfig {
    /// Loads defaults, then `path` if given, then the environment.
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(TimelineConfig::default()));
        if let Some(path) = path {
            debug!("🔧 Reading timeline configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        let config: TimelineConfig = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.log.trim().is_empty() {
            return Err(MatrixonError::Config("log filter cannot be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_config_default() {
        let config = TimelineConfig::default();
        assert_eq!(config.log, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.enable_metrics);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "timeline.toml",
                r#"
                    log = "debug"
                    log_format = "json"
                "#,
            )?;
            jail.set_env("MATRIXON_TIMELINE_ENABLE_METRICS", "true");

            let config = TimelineConfig::load(Some(Path::new("timeline.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.log, "debug");
            assert_eq!(config.log_format, LogFormat::Json);
            assert!(config.enable_metrics);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("timeline.toml", r#"log = "debug""#)?;
            jail.set_env("MATRIXON_TIMELINE_LOG", "warn");

            let config = TimelineConfig::load(Some(Path::new("timeline.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.log, "warn");
            Ok(())
        });
    }

    #[test]
    fn test_config_validation() {
        let mut config = TimelineConfig::default();
        config.log = "  ".to_owned();
        assert!(matches!(config.validate(), Err(MatrixonError::Config(_))));
    }
}
