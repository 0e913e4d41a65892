//! BLE adapter error types.

use soilprobe_app::ports::TransportError;

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// A btleplug operation failed.
    #[error("BLE operation failed")]
    Btle(#[from] btleplug::Error),

    /// The scan finished without a matching peripheral.
    #[error("no matching soil probe found")]
    DeviceNotFound,

    /// Connecting and subscribing did not finish in time.
    #[error("timed out connecting to soil probe")]
    ConnectTimeout,

    /// The peripheral does not expose the probe service.
    #[error("service {uuid} not found")]
    ServiceNotFound {
        /// Expected service UUID.
        uuid: uuid::Uuid,
    },

    /// A required characteristic is missing.
    #[error("characteristic {uuid} not found")]
    CharacteristicNotFound {
        /// Expected characteristic UUID.
        uuid: uuid::Uuid,
    },
}

impl From<BleError> for TransportError {
    fn from(err: BleError) -> Self {
        Self::Write(Box::new(err))
    }
}
