//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the session core and the outside
//! world. They live here so that both the session and the adapters can
//! depend on them without circular dependencies.

pub mod transport;

pub use transport::{Transport, TransportError, TransportEvent};
