//! Transport port — an opaque byte channel to the probe.
//!
//! Outbound bytes go through [`Transport::write`]. Inbound traffic
//! (notification fragments, link changes) is delivered as
//! [`TransportEvent`]s on a channel the adapter hands to the driver.

use std::future::Future;

/// Something that happened on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The link is up and commands may be written.
    Connected,
    /// A chunk of reply bytes. Chunk boundaries carry no meaning.
    Fragment(Vec<u8>),
    /// The link went down.
    Disconnected,
}

/// Errors raised by transport adapters.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Nothing to write to.
    #[error("transport not connected")]
    NotConnected,

    /// The underlying write failed.
    #[error("transport write failed")]
    Write(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Outbound half of a probe link.
pub trait Transport: Send + Sync {
    /// Whether the link is currently usable.
    fn is_connected(&self) -> bool;

    /// Write one encoded command.
    fn write(&self, bytes: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn write(&self, bytes: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).write(bytes)
    }
}
