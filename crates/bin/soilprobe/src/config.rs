//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `soilprobe.toml` in the working directory unless a path is
//! given on the command line. Every field has a sensible default so the
//! default file is optional. Environment variables take precedence over
//! file values.

use std::path::Path;

use serde::Deserialize;
use soilprobe_adapter_ble::BleConfig;
use soilprobe_app::config::SessionConfig;
use soilprobe_domain::frame::TERMINATOR;
use soilprobe_domain::sensor::{self, SensorDescriptor, SensorRegistry};

const DEFAULT_PATH: &str = "soilprobe.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Command session tunables.
    pub session: SessionConfig,
    /// Extra or overriding sensor descriptors.
    pub sensors: Vec<SensorDescriptor>,
    /// Probe discovery and connection.
    pub ble: BleConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "soilprobe=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `soilprobe.toml` if present,
    /// then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit `path` cannot be read, the file is
    /// malformed, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_optional_file(Path::new(DEFAULT_PATH))?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    fn from_optional_file(path: &Path) -> Result<Self, ConfigError> {
        match Self::from_file(path) {
            Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SOILPROBE_TIMEOUT_MS")
            && let Ok(ms) = val.parse()
        {
            self.session.timeout_ms = ms;
        }
        if let Ok(val) = std::env::var("SOILPROBE_DEVICE") {
            self.ble.device_filter = vec![val];
        }
        if let Ok(val) = std::env::var("SOILPROBE_NAME_PREFIX") {
            self.ble.name_prefix = Some(val);
        }
        if let Ok(val) = std::env::var("SOILPROBE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "session timeout must be non-zero".to_string(),
            ));
        }
        if self.session.max_frame_bytes <= TERMINATOR.len() {
            return Err(ConfigError::Validation(format!(
                "max_frame_bytes must exceed {} bytes",
                TERMINATOR.len()
            )));
        }
        if let Some(id) = self
            .session
            .positional_order
            .iter()
            .find(|id| !sensor::is_identifier(id))
        {
            return Err(ConfigError::Validation(format!(
                "positional_order entry {id:?} is not a four-digit identifier"
            )));
        }
        for descriptor in &self.sensors {
            if !sensor::is_identifier(&descriptor.id) {
                return Err(ConfigError::Validation(format!(
                    "sensor id {:?} is not a four-digit identifier",
                    descriptor.id
                )));
            }
            if !descriptor.scale.is_normal() {
                return Err(ConfigError::Validation(format!(
                    "sensor {} scale must be finite and non-zero",
                    descriptor.id
                )));
            }
        }
        Ok(())
    }

    /// Standard sensor table with configured descriptors applied on top.
    #[must_use]
    pub fn registry(&self) -> SensorRegistry {
        let mut registry = SensorRegistry::standard();
        registry.extend(self.sensors.iter().cloned());
        registry
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
