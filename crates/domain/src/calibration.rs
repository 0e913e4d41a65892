//! Maps raw identifier/value pairs to labeled physical
//! readings.
//!
//! Unknown identifiers are dropped. Error sentinels and unparseable
//! values become absent readings rather than failures: a probe with one
//! dead sensor still reports the others.

use crate::error::CalibrationError;
use crate::reading::{CalibratedReading, RawReading, ReadingSet, ReadingStatus};
use crate::sensor::{SensorDescriptor, SensorRegistry};

/// Firmware fault codes reported in place of a value.
const FAULT_CODES: &[&str] = &["2000001", "2000003"];

/// Whether `raw` is one of the values the firmware uses to signal an
/// offline or faulty sensor.
///
/// Covers `ERROR`, the letter-`O` family some firmware sends instead of a
/// zero (`O`, `O.0`, `O.00`, any case), `0.00`, the fault codes
/// `2000001`/`2000003`, and the empty string.
#[must_use]
pub fn is_sentinel(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty()
        || raw.eq_ignore_ascii_case("ERROR")
        || raw == "0.00"
        || FAULT_CODES.contains(&raw)
        || is_letter_o(raw)
}

fn is_letter_o(raw: &str) -> bool {
    let Some(rest) = raw.strip_prefix(['O', 'o']) else {
        return false;
    };
    match rest.strip_prefix('.') {
        Some(digits) => digits.bytes().all(|b| b.is_ascii_digit()),
        None => rest.is_empty(),
    }
}

/// Calibrate a single raw value against its descriptor.
#[must_use]
pub fn calibrate_value(descriptor: &SensorDescriptor, raw: &str) -> CalibratedReading {
    let label = descriptor.label();

    let (value, status) = if is_sentinel(raw) {
        tracing::warn!(id = %descriptor.id, %label, raw, "sensor reported error");
        (
            None,
            ReadingStatus::SensorError {
                raw: raw.to_owned(),
            },
        )
    } else {
        match raw.trim().parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => {
                let value = descriptor.calibrate(parsed);
                tracing::debug!(id = %descriptor.id, %label, value, "sensor value");
                (Some(value), ReadingStatus::Valid)
            }
            _ => {
                tracing::warn!(id = %descriptor.id, %label, raw, "sensor value is not a number");
                (
                    None,
                    ReadingStatus::Unparseable {
                        raw: raw.to_owned(),
                    },
                )
            }
        }
    };

    CalibratedReading {
        id: descriptor.id.to_string(),
        label,
        value,
        status,
    }
}

/// Map every known identifier of `raw` to a calibrated reading, keeping
/// the order of `raw`.
///
/// # Errors
///
/// Returns [`CalibrationError::NoSensorData`] when `raw` holds no
/// identifier known to `registry`.
pub fn calibrate(
    raw: &RawReading,
    registry: &SensorRegistry,
) -> Result<ReadingSet, CalibrationError> {
    let readings: Vec<CalibratedReading> = raw
        .iter()
        .filter_map(|(id, value)| {
            let Some(descriptor) = registry.get(id) else {
                tracing::debug!(id, raw = value, "skipping unknown parameter");
                return None;
            };
            Some(calibrate_value(descriptor, value))
        })
        .collect();

    if readings.is_empty() {
        return Err(CalibrationError::NoSensorData);
    }

    Ok(ReadingSet::new(readings))
}
