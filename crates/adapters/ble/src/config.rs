//! BLE adapter configuration.

use std::time::Duration;

use serde::Deserialize;

/// How to find and connect to the probe.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// How long to scan for the probe, in seconds.
    pub scan_duration_secs: u16,
    /// Optional MAC address allowlist (e.g. `["C8:47:8C:00:12:34"]`).
    ///
    /// When empty, any peripheral advertising the probe service (or
    /// matching [`name_prefix`](Self::name_prefix)) is accepted.
    pub device_filter: Vec<String>,
    /// Accept peripherals whose local name starts with this prefix.
    pub name_prefix: Option<String>,
    /// Upper bound for connecting and subscribing, in seconds.
    pub connect_timeout_secs: u16,
}

impl BleConfig {
    #[must_use]
    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.scan_duration_secs))
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_secs))
    }
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            scan_duration_secs: 5,
            device_filter: Vec::new(),
            name_prefix: None,
            connect_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_short_scan() {
        let config = BleConfig::default();
        assert_eq!(config.scan_duration(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(config.device_filter.is_empty());
        assert!(config.name_prefix.is_none());
    }

    #[test]
    fn should_deserialize_partial_table() {
        let config: BleConfig = toml::from_str(
            r#"
                device_filter = ["C8:47:8C:00:12:34"]
                name_prefix = "SOIL"
            "#,
        )
        .unwrap();
        assert_eq!(config.scan_duration_secs, 5);
        assert_eq!(config.device_filter, ["C8:47:8C:00:12:34"]);
        assert_eq!(config.name_prefix.as_deref(), Some("SOIL"));
    }
}
