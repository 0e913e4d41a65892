//! AT command encoding.
//!
//! Wire grammar: `"AT+" name ["=" json-payload] "\r\n"`. The device answers
//! each command with a single reply ending in
//! [`TERMINATOR`](crate::frame::TERMINATOR).

use std::fmt;

/// How the reply to a command should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Sensor values: parsed, then calibrated against the registry.
    Measurement,
    /// Key/value document (device info, sensor list): parsed only.
    Query,
    /// Acknowledgement: any complete reply is success.
    Ack,
}

/// A command ready to be written to the device.
#[derive(Debug, Clone, PartialEq)]
pub struct AtCommand {
    name: String,
    payload: Option<serde_json::Value>,
    kind: ResponseKind,
}

impl AtCommand {
    /// Build an arbitrary command without payload.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ResponseKind) -> Self {
        Self {
            name: name.into(),
            payload: None,
            kind,
        }
    }

    /// Attach a JSON payload, sent as `=<json>` after the name.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// `AT+MEA=?`: read all sensor values.
    #[must_use]
    pub fn measure() -> Self {
        Self::new("MEA=?", ResponseKind::Measurement)
    }

    /// `AT+INFO=?`: device identification.
    #[must_use]
    pub fn device_info() -> Self {
        Self::new("INFO=?", ResponseKind::Query)
    }

    /// `AT+SENSOR=?`: sensors attached to the probe.
    #[must_use]
    pub fn sensor_list() -> Self {
        Self::new("SENSOR=?", ResponseKind::Query)
    }

    /// `AT+CONFIG=<json>`: write device parameters.
    #[must_use]
    pub fn configure(config: serde_json::Value) -> Self {
        Self::new("CONFIG", ResponseKind::Ack).with_payload(config)
    }

    /// `AT+RESTORE`: factory reset.
    #[must_use]
    pub fn restore_factory() -> Self {
        Self::new("RESTORE", ResponseKind::Ack)
    }

    /// Command name as written after `AT+`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional JSON payload.
    #[must_use]
    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    /// Expected reply interpretation.
    #[must_use]
    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// Encode the command for the transport.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AT+{}", self.name)?;
        if let Some(payload) = &self.payload {
            write!(f, "={payload}")?;
        }
        Ok(())
    }
}
