//! Probe discovery.
//!
//! Scans for up to [`BleConfig::scan_duration`] and returns the first
//! peripheral accepted by the configured [`ProbeFilter`].

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio_stream::StreamExt as _;

use crate::config::BleConfig;
use crate::error::BleError;
use crate::gatt::SERVICE_UUID;

/// Decides whether an advertising peripheral is the probe we want.
#[derive(Debug, Clone, Default)]
pub struct ProbeFilter {
    device_filter: Vec<String>,
    name_prefix: Option<String>,
}

impl ProbeFilter {
    #[must_use]
    pub fn from_config(config: &BleConfig) -> Self {
        Self {
            device_filter: config.device_filter.clone(),
            name_prefix: config.name_prefix.clone().filter(|p| !p.is_empty()),
        }
    }

    /// Check an advertisement against the filter.
    ///
    /// The MAC allowlist and name prefix must both pass when set. With
    /// neither set, the peripheral must advertise the probe service.
    #[must_use]
    pub fn matches(&self, mac: &str, name: Option<&str>, services: &[uuid::Uuid]) -> bool {
        let mac_ok = self.device_filter.is_empty()
            || self
                .device_filter
                .iter()
                .any(|f| f.eq_ignore_ascii_case(mac));
        let name_ok = match &self.name_prefix {
            Some(prefix) => name.is_some_and(|n| n.starts_with(prefix.as_str())),
            None => true,
        };

        if self.device_filter.is_empty() && self.name_prefix.is_none() {
            return services.contains(&SERVICE_UUID);
        }
        mac_ok && name_ok
    }
}

/// Scan for the probe.
///
/// # Errors
///
/// Returns [`BleError::NotAvailable`] without a BLE adapter,
/// [`BleError::DeviceNotFound`] when nothing matched before the scan
/// window closed, and [`BleError::Btle`] when scanning fails.
pub async fn find_probe(config: &BleConfig) -> Result<(Adapter, Peripheral), BleError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    let central = adapters.into_iter().next().ok_or(BleError::NotAvailable)?;
    let filter = ProbeFilter::from_config(config);

    let mut events = central.events().await?;
    central.start_scan(ScanFilter::default()).await?;

    tracing::info!(
        duration_secs = config.scan_duration_secs,
        "scanning for soil probe"
    );

    let deadline = tokio::time::Instant::now() + config.scan_duration();
    let mut found = None;

    while tokio::time::Instant::now() < deadline {
        let remaining = deadline - tokio::time::Instant::now();
        match tokio::time::timeout(remaining, events.next()).await {
            Ok(Some(
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id),
            )) => {
                let Ok(peripheral) = central.peripheral(&id).await else {
                    continue;
                };
                let Ok(Some(props)) = peripheral.properties().await else {
                    continue;
                };
                let mac = props.address.to_string();
                tracing::trace!(%mac, name = ?props.local_name, "BLE device detected");
                if filter.matches(&mac, props.local_name.as_deref(), &props.services) {
                    tracing::info!(
                        %mac,
                        name = ?props.local_name,
                        rssi = ?props.rssi,
                        "soil probe found"
                    );
                    found = Some(peripheral);
                    break;
                }
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }

    if let Err(err) = central.stop_scan().await {
        tracing::warn!(%err, "failed to stop BLE scan");
    }

    let peripheral = found.ok_or(BleError::DeviceNotFound)?;
    Ok((central, peripheral))
}
