//! Stack configuration.
//!
//! Configuration is read from an optional `gqlstack.toml` file and
//! `GQLSTACK__`-prefixed environment variables (e.g.
//! `GQLSTACK__SERVICES__COUNTER_START=10`).
//!
//! # Example Configuration
//!
//! ```toml
//! [engine]
//! max_depth = 15
//! field_timeout_ms = 5000
//!
//! [transport]
//! max_body_bytes = 1048576
//!
//! [logging]
//! level = "info"
//!
//! [services]
//! counter_start = 0
//!
//! [schema]
//! output_path = "schema.graphql"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::StackError;

/// Default configuration file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "gqlstack.toml";

/// Top-level stack configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub schema: SchemaExportConfig,
}

/// Execution engine limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum selection depth allowed.
    /// Default: 15
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Per-field resolver timeout in milliseconds. Unset means no timeout.
    #[serde(default)]
    pub field_timeout_ms: Option<u64>,
}

/// Transport bridge limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Largest accepted request body.
    /// Default: 1 MiB
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Settings for the bundled example services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Initial value of the singleton counter.
    #[serde(default)]
    pub counter_start: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaExportConfig {
    /// Where `gqlstack schema` writes the SDL when no `--out` is given.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

fn default_max_depth() -> usize {
    15
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("schema.graphql")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            field_timeout_ms: None,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for SchemaExportConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn field_timeout(&self) -> Option<Duration> {
        self.field_timeout_ms.map(Duration::from_millis)
    }
}

impl StackConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.engine.max_depth == 0 {
            return Err("engine.max_depth must be > 0".into());
        }
        if self.engine.field_timeout_ms == Some(0) {
            return Err("engine.field_timeout_ms must be > 0 when set".into());
        }
        if self.transport.max_body_bytes == 0 {
            return Err("transport.max_body_bytes must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

/// Loads configuration from `path` (or [`DEFAULT_CONFIG_FILE`]) plus
/// environment overrides, then validates it.
///
/// A missing file is not an error; defaults apply.
pub fn load_config(path: Option<&Path>) -> Result<StackConfig, StackError> {
    let mut builder = Config::builder();
    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if file.exists() {
        builder = builder.add_source(File::from(file));
    }
    builder = builder.add_source(
        Environment::with_prefix("GQLSTACK")
            .try_parsing(true)
            .separator("__"),
    );
    let merged: StackConfig = builder.build()?.try_deserialize()?;
    merged.validate().map_err(StackError::Config)?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StackConfig::default();
        assert_eq!(config.engine.max_depth, 15);
        assert!(config.engine.field_timeout().is_none());
        assert_eq!(config.transport.max_body_bytes, 1024 * 1024);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.services.counter_start, 0);
        assert_eq!(config.schema.output_path, PathBuf::from("schema.graphql"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_max_depth() {
        let mut config = StackConfig::default();
        config.engine.max_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = StackConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = StackConfig::default();
        config.engine.field_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let toml = r#"
            [engine]
            max_depth = 4
            field_timeout_ms = 250

            [services]
            counter_start = 10
        "#;

        let config: StackConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.max_depth, 4);
        assert_eq!(
            config.engine.field_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.services.counter_start, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.toml");
        std::fs::write(&path, "[services]\ncounter_start = 7\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.services.counter_start, 7);
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.toml");
        std::fs::write(&path, "[engine]\nmax_depth = 0\n").unwrap();

        assert!(matches!(
            load_config(Some(&path)),
            Err(StackError::Config(_))
        ));
    }
}
