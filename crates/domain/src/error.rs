//! Error types for the framing, parsing and calibration stages.
//!
//! Each stage has its own error; [`ProbeError`] groups the two that can end
//! a measurement after a complete reply was received.

/// Framing failures raised by [`FrameBuffer`](crate::frame::FrameBuffer).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The accumulator grew past its limit without seeing a terminator.
    #[error("reply exceeded {limit} bytes without a terminator")]
    Overflow {
        /// Configured maximum size in bytes.
        limit: usize,
    },
}

/// Recovery parser failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// No extraction strategy produced a single key/value pair.
    #[error("malformed response: {raw:?}")]
    MalformedResponse {
        /// The complete reply text, kept for diagnostics.
        raw: String,
    },
}

/// Calibration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalibrationError {
    /// The reply parsed but contained no known sensor identifier.
    #[error("reply contained no known sensor data")]
    NoSensorData,
}

/// Failure of the reply-to-readings pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// The reply could not be parsed.
    #[error("parse error")]
    Parse(#[from] ParseError),

    /// The reply parsed but could not be calibrated.
    #[error("calibration error")]
    Calibration(#[from] CalibrationError),
}
