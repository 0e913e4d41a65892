//! Session configuration.

use std::time::Duration;

use serde::Deserialize;
use soilprobe_domain::frame::DEFAULT_MAX_FRAME_BYTES;
use soilprobe_domain::sensor::STANDARD_ORDER;

/// Tunables for the command session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long to wait for a reply terminator, in milliseconds.
    pub timeout_ms: u64,
    /// Largest reply accepted before framing fails, in bytes.
    pub max_frame_bytes: usize,
    /// Identifiers assigned to bare comma-separated values, in order.
    ///
    /// Firmware variants disagree on this order; an empty list disables
    /// positional parsing.
    pub positional_order: Vec<String>,
}

impl SessionConfig {
    /// Reply deadline as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            positional_order: STANDARD_ORDER.iter().map(|id| (*id).to_owned()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_frame_bytes, 4096);
        assert_eq!(
            config.positional_order,
            ["4102", "4103", "4104", "4108", "4110"]
        );
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            timeout_ms = 2500
            positional_order = ["4102", "4108", "4110"]
        "#;
        let config: SessionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.timeout_ms, 2500);
        assert_eq!(config.max_frame_bytes, 4096);
        assert_eq!(config.positional_order.len(), 3);
    }
}
