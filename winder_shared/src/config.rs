//! Shared configuration logic for the host, the simulator and tests.
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud = 115200
//! write_timeout_ms = 1000
//!
//! [planner]
//! verbose = false
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every section and key is optional.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: default_baud(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl SerialConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlannerConfig {
    /// Annotate generated G-code with move and layer comments.
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl LoggingConfig {
    pub fn tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.level)))
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.baud == 0 {
            return Err(ConfigError::Invalid("serial baud must be > 0".to_string()));
        }
        if self.serial.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid("serial write_timeout_ms must be > 0".to_string()));
        }
        self.logging.tracing_level()?;
        Ok(())
    }
}

fn default_baud() -> u32 { crate::protocol::DEFAULT_BAUD }
fn default_write_timeout_ms() -> u64 { 1000 }
fn default_log_level() -> String { "info".to_string() }

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config: Config = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                return Err(ConfigError::Toml(e));
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.serial.port, None);
        assert_eq!(config.serial.baud, 115_200);
        assert_eq!(config.serial.write_timeout(), Duration::from_secs(1));
        assert!(!config.planner.verbose);
        assert_eq!(config.logging.tracing_level().unwrap(), tracing::Level::INFO);
    }

    #[test]
    fn test_overrides_are_read() {
        let toml_str = r#"
            [serial]
            port = "/dev/ttyACM0"
            baud = 250000

            [planner]
            verbose = true

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.serial.baud, 250_000);
        assert_eq!(config.serial.write_timeout_ms, 1000);
        assert!(config.planner.verbose);
        assert_eq!(config.logging.tracing_level().unwrap(), tracing::Level::DEBUG);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.serial.baud = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_config_reports_io_and_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(load_config(missing.to_str().unwrap()), Err(ConfigError::Io(_))));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[serial\nbaud = ").unwrap();
        assert!(matches!(load_config(broken.to_str().unwrap()), Err(ConfigError::Toml(_))));

        let good = dir.path().join("winder.toml");
        std::fs::write(&good, "[serial]\nport = \"/dev/ttyUSB1\"\n").unwrap();
        let config = load_config(good.to_str().unwrap()).unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyUSB1"));
    }
}
