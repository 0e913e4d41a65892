//! Raw key/value pairs out of the parser and calibrated
//! values out of the mapper.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Ordered identifier → raw value mapping extracted from one reply.
///
/// Iteration follows insertion order. Inserting an existing key replaces
/// its value without moving it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReading {
    entries: Vec<(String, String)>,
}

impl RawReading {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up a raw value by identifier.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no pair was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawReading {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut reading = Self::new();
        for (key, value) in iter {
            reading.insert(key, value);
        }
        reading
    }
}

impl Serialize for RawReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Why a calibrated reading has (or lacks) a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReadingStatus {
    /// The raw value parsed and was scaled.
    Valid,
    /// The device reported an error sentinel (offline probe, fault code).
    SensorError {
        /// Sentinel as sent by the device.
        raw: String,
    },
    /// The raw value was not a number.
    Unparseable {
        /// Offending raw value.
        raw: String,
    },
}

/// One labeled sensor value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibratedReading {
    /// Four-digit parameter identifier.
    pub id: String,
    /// Display label, `"<name> (<unit>)"`.
    pub label: String,
    /// Physical value; `None` when the sensor is offline or erroneous.
    pub value: Option<f64>,
    /// Classification of the raw value.
    #[serde(flatten)]
    pub status: ReadingStatus,
}

/// Calibrated readings in reply order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReadingSet {
    readings: Vec<CalibratedReading>,
}

impl ReadingSet {
    /// Wrap an ordered list of readings.
    #[must_use]
    pub fn new(readings: Vec<CalibratedReading>) -> Self {
        Self { readings }
    }

    /// Values, parallel to [`labels`](Self::labels).
    #[must_use]
    pub fn values(&self) -> Vec<Option<f64>> {
        self.readings.iter().map(|r| r.value).collect()
    }

    /// Labels, parallel to [`values`](Self::values).
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.readings.iter().map(|r| r.label.as_str()).collect()
    }

    /// Find the reading for an identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CalibratedReading> {
        self.readings.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalibratedReading> {
        self.readings.iter()
    }
}

impl IntoIterator for ReadingSet {
    type Item = CalibratedReading;
    type IntoIter = std::vec::IntoIter<CalibratedReading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.into_iter()
    }
}
