//! Reply-to-readings pipeline for measurement commands.

use crate::calibration;
use crate::error::ProbeError;
use crate::frame::RawMessage;
use crate::parser::RecoveryParser;
use crate::reading::ReadingSet;
use crate::sensor::SensorRegistry;

/// Parse a complete measurement reply and calibrate its values.
///
/// # Errors
///
/// Returns [`ProbeError::Parse`] when no pair could be extracted and
/// [`ProbeError::Calibration`] when none of the pairs is a known sensor.
pub fn decode_measurement(
    message: &RawMessage,
    parser: &RecoveryParser,
    registry: &SensorRegistry,
) -> Result<ReadingSet, ProbeError> {
    let raw = parser.parse(message)?;
    let readings = calibration::calibrate(&raw, registry)?;
    Ok(readings)
}
