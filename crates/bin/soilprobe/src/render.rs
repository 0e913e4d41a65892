//! Result rendering for stdout.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use soilprobe_domain::reading::{RawReading, ReadingSet};

/// One line per reading: `label: value`, or `label: offline` when the
/// sensor reported an error or an unreadable value.
#[must_use]
pub fn readings_text(set: &ReadingSet) -> String {
    let mut out = String::new();
    for reading in set.iter() {
        match reading.value {
            Some(value) => {
                let _ = writeln!(out, "{}: {value}", reading.label);
            }
            None => {
                let _ = writeln!(out, "{}: offline", reading.label);
            }
        }
    }
    out
}

/// One `key: value` line per field, in reply order.
#[must_use]
pub fn fields_text(fields: &RawReading) -> String {
    let mut out = String::new();
    for (key, value) in fields.iter() {
        let _ = writeln!(out, "{key}: {value}");
    }
    out
}

#[derive(Serialize)]
struct Timestamped<'a, T> {
    taken_at: DateTime<Utc>,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Serialize)]
struct Readings<'a> {
    readings: &'a ReadingSet,
}

#[derive(Serialize)]
struct Fields<'a> {
    fields: &'a RawReading,
}

#[derive(Serialize)]
struct Ack<'a> {
    reply: &'a str,
}

/// JSON document for a measurement.
///
/// # Errors
///
/// Propagates serializer failures.
pub fn readings_json(set: &ReadingSet, taken_at: DateTime<Utc>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Timestamped {
        taken_at,
        body: &Readings { readings: set },
    })
}

/// JSON document for a query reply.
///
/// # Errors
///
/// Propagates serializer failures.
pub fn fields_json(fields: &RawReading, taken_at: DateTime<Utc>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Timestamped {
        taken_at,
        body: &Fields { fields },
    })
}

/// JSON document for an acknowledged command.
///
/// # Errors
///
/// Propagates serializer failures.
pub fn ack_json(reply: &str, taken_at: DateTime<Utc>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Timestamped {
        taken_at,
        body: &Ack { reply },
    })
}
