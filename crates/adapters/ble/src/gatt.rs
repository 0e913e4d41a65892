//! GATT link to the probe's serial-over-BLE service.
//!
//! The probe exposes a transparent UART: commands are written to one
//! characteristic and replies arrive as notifications on another, split at
//! arbitrary MTU-sized boundaries. [`open`] connects, subscribes and spawns
//! a task forwarding every notification as a
//! [`TransportEvent::Fragment`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use btleplug::api::{Central as _, CentralEvent, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use soilprobe_app::ports::{Transport, TransportError, TransportEvent};

use crate::error::BleError;

/// Primary service carrying the serial link.
pub const SERVICE_UUID: uuid::Uuid =
    uuid::Uuid::from_u128(0x4953_5343_fe7d_4ae5_8fa9_9faf_d205_e455);

/// Characteristic commands are written to.
pub const WRITE_CHAR: uuid::Uuid = uuid::Uuid::from_u128(0x4953_5343_8841_43f4_a8d4_ecbe_3472_9bb3);

/// Characteristic replies are notified on.
pub const NOTIFY_CHAR: uuid::Uuid =
    uuid::Uuid::from_u128(0x4953_5343_1e4d_4bd9_ba61_23c6_4724_9616);

/// Find a GATT characteristic by UUID on a peripheral that has already
/// discovered its services.
///
/// # Errors
///
/// Returns [`BleError::CharacteristicNotFound`] if no characteristic with
/// the given UUID is present.
fn find_characteristic(
    peripheral: &Peripheral,
    uuid: uuid::Uuid,
) -> Result<Characteristic, BleError> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or(BleError::CharacteristicNotFound { uuid })
}

/// Connect to the probe, subscribe to reply notifications and start
/// forwarding them on `events`.
///
/// A [`TransportEvent::Connected`] is sent once the subscription is active.
/// The connection is closed again if any step after `connect` fails. The
/// caller is responsible for applying a timeout around this function.
///
/// # Errors
///
/// Returns [`BleError::ServiceNotFound`] or
/// [`BleError::CharacteristicNotFound`] when the peripheral is not a probe,
/// and [`BleError::Btle`] for connection failures.
pub async fn open(
    central: &Adapter,
    peripheral: Peripheral,
    events: mpsc::Sender<TransportEvent>,
) -> Result<BleTransport, BleError> {
    peripheral.connect().await?;

    match open_inner(central, peripheral.clone(), events).await {
        Ok(transport) => Ok(transport),
        Err(err) => {
            if let Err(disconnect_err) = peripheral.disconnect().await {
                tracing::warn!(err = %disconnect_err, "failed to disconnect after setup error");
            }
            Err(err)
        }
    }
}

/// Setup after `connect`, separated so the caller can always disconnect.
async fn open_inner(
    central: &Adapter,
    peripheral: Peripheral,
    events: mpsc::Sender<TransportEvent>,
) -> Result<BleTransport, BleError> {
    peripheral.discover_services().await?;

    if !peripheral.services().iter().any(|s| s.uuid == SERVICE_UUID) {
        return Err(BleError::ServiceNotFound { uuid: SERVICE_UUID });
    }

    let write_char = find_characteristic(&peripheral, WRITE_CHAR)?;
    let notify_char = find_characteristic(&peripheral, NOTIFY_CHAR)?;

    let central_events = central.events().await?;
    let notifications = peripheral.notifications().await?;
    peripheral.subscribe(&notify_char).await?;

    let connected = Arc::new(AtomicBool::new(true));
    if events.send(TransportEvent::Connected).await.is_err() {
        tracing::debug!("event receiver dropped before link came up");
    }

    let forward = tokio::spawn(forward_notifications(
        peripheral.clone(),
        notifications,
        central_events,
        events,
        Arc::clone(&connected),
    ));

    tracing::info!(address = %peripheral.address(), "soil probe link up");

    Ok(BleTransport {
        peripheral,
        write_char,
        connected,
        forward,
    })
}

type NotificationStream = std::pin::Pin<
    Box<dyn tokio_stream::Stream<Item = btleplug::api::ValueNotification> + Send>,
>;
type CentralEventStream = std::pin::Pin<Box<dyn tokio_stream::Stream<Item = CentralEvent> + Send>>;

/// Forward reply notifications until the peripheral disconnects, then
/// report [`TransportEvent::Disconnected`].
async fn forward_notifications(
    peripheral: Peripheral,
    mut notifications: NotificationStream,
    mut central_events: CentralEventStream,
    events: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
) {
    let id = peripheral.id();
    loop {
        tokio::select! {
            notification = notifications.next() => {
                let Some(notification) = notification else {
                    tracing::debug!("notification stream ended");
                    break;
                };
                if notification.uuid != NOTIFY_CHAR {
                    continue;
                }
                tracing::trace!(len = notification.value.len(), "notification received");
                if events.send(TransportEvent::Fragment(notification.value)).await.is_err() {
                    tracing::debug!("event receiver dropped, stopping forwarder");
                    break;
                }
            }
            event = central_events.next() => match event {
                Some(CentralEvent::DeviceDisconnected(gone)) if gone == id => {
                    tracing::info!("soil probe disconnected");
                    break;
                }
                Some(_) => {}
                None => {
                    tracing::debug!("adapter event stream ended");
                    break;
                }
            },
        }
    }

    connected.store(false, Ordering::SeqCst);
    if events.send(TransportEvent::Disconnected).await.is_err() {
        tracing::trace!("event receiver already dropped");
    }
}

/// [`Transport`] backed by a connected GATT peripheral.
pub struct BleTransport {
    peripheral: Peripheral,
    write_char: Characteristic,
    connected: Arc<AtomicBool>,
    forward: JoinHandle<()>,
}

impl BleTransport {
    /// Stop forwarding and disconnect. Errors are logged, not returned.
    pub async fn disconnect(self) {
        self.connected.store(false, Ordering::SeqCst);
        self.forward.abort();
        if let Err(err) = self.peripheral.disconnect().await {
            tracing::warn!(%err, "failed to disconnect soil probe");
        }
    }
}

impl Transport for BleTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.peripheral
            .write(&self.write_char, bytes, WriteType::WithResponse)
            .await
            .map_err(|err| TransportError::from(BleError::Btle(err)))
    }
}
