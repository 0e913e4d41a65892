//! # soilprobe-adapter-ble
//!
//! BLE adapter — finds the soil probe and implements the
//! [`Transport`](soilprobe_app::ports::Transport) port over its
//! serial-over-GATT service.
//!
//! ## How it works
//!
//! 1. Scan until a peripheral passes the [`ProbeFilter`]
//! 2. Connect, discover services, subscribe to the notify characteristic
//! 3. Forward every notification as a fragment on the event channel
//!
//! | Role | UUID |
//! |------|------|
//! | Service | `49535343-fe7d-4ae5-8fa9-9fafd205e455` |
//! | Write | `49535343-8841-43f4-a8d4-ecbe34729bb3` |
//! | Notify | `49535343-1e4d-4bd9-ba61-23c647249616` |
//!
//! ## Dependency rule
//!
//! Depends on `soilprobe-app` only; the framing and parsing of replies is
//! the session's business.

mod config;
mod error;
pub mod gatt;
mod scanner;

pub use config::BleConfig;
pub use error::BleError;
pub use gatt::BleTransport;
pub use scanner::{ProbeFilter, find_probe};

use tokio::sync::mpsc;

use soilprobe_app::ports::TransportEvent;

/// Capacity of the fragment channel. Replies are a few notifications long.
const EVENT_CAPACITY: usize = 64;

/// Scan for the probe and open a link to it.
///
/// Returns the transport and the event channel to hand to the session
/// driver; the first event on it is [`TransportEvent::Connected`].
///
/// # Errors
///
/// Any scan or GATT [`BleError`], or [`BleError::ConnectTimeout`] when
/// connecting exceeds [`BleConfig::connect_timeout`].
pub async fn connect(
    config: &BleConfig,
) -> Result<(BleTransport, mpsc::Receiver<TransportEvent>), BleError> {
    let (central, peripheral) = find_probe(config).await?;
    let (tx, rx) = mpsc::channel(EVENT_CAPACITY);

    let transport = tokio::time::timeout(
        config.connect_timeout(),
        gatt::open(&central, peripheral, tx),
    )
    .await
    .map_err(|_| BleError::ConnectTimeout)??;

    Ok((transport, rx))
}
