//! Sensor registry — the curated set of parameter identifiers the probe
//! reports, with their display name, unit and scale factor.

use std::borrow::Cow;

use serde::Deserialize;

/// Static description of one sensor parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorDescriptor {
    /// Four-digit parameter identifier (e.g. `"4102"`).
    pub id: Cow<'static, str>,
    /// Human-readable name.
    pub name: Cow<'static, str>,
    /// Unit symbol.
    pub unit: Cow<'static, str>,
    /// Divisor applied to the raw value.
    pub scale: f64,
}

impl SensorDescriptor {
    /// Build a descriptor from static strings.
    #[must_use]
    pub const fn new(id: &'static str, name: &'static str, unit: &'static str, scale: f64) -> Self {
        Self {
            id: Cow::Borrowed(id),
            name: Cow::Borrowed(name),
            unit: Cow::Borrowed(unit),
            scale,
        }
    }

    /// Display label, `"<name> (<unit>)"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.unit)
    }

    /// Convert a raw device value into physical units.
    #[must_use]
    pub fn calibrate(&self, raw: f64) -> f64 {
        raw / self.scale
    }
}

/// Parameters reported by the standard probe firmware.
pub const STANDARD_SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor::new("4102", "Soil moisture", "%", 1000.0),
    SensorDescriptor::new("4103", "Soil temperature", "℃", 1000.0),
    SensorDescriptor::new("4104", "Battery", "%", 1.0),
    SensorDescriptor::new("4108", "Soil conductivity", "μS/cm", 1000.0),
    SensorDescriptor::new("4110", "Soil pH", "pH", 100.0),
];

/// Default identifier order for replies that carry bare values only.
pub const STANDARD_ORDER: &[&str] = &["4102", "4103", "4104", "4108", "4110"];

/// Whether `s` has the shape of a parameter identifier (four ASCII digits).
#[must_use]
pub fn is_identifier(s: &str) -> bool {
    s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Lookup table of known sensors.
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    sensors: Vec<SensorDescriptor>,
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl SensorRegistry {
    /// The standard five-parameter table.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            sensors: STANDARD_SENSORS.to_vec(),
        }
    }

    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sensors: Vec::new(),
        }
    }

    /// Add a descriptor, replacing any existing entry with the same id.
    #[must_use]
    pub fn with(mut self, descriptor: SensorDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    /// In-place form of [`with`](Self::with).
    pub fn insert(&mut self, descriptor: SensorDescriptor) {
        match self.sensors.iter_mut().find(|s| s.id == descriptor.id) {
            Some(existing) => *existing = descriptor,
            None => self.sensors.push(descriptor),
        }
    }

    /// Resolve an identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SensorDescriptor> {
        self.sensors.iter().find(|s| s.id == id)
    }

    /// Iterate descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.sensors.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

impl Extend<SensorDescriptor> for SensorRegistry {
    fn extend<I: IntoIterator<Item = SensorDescriptor>>(&mut self, iter: I) {
        for descriptor in iter {
            self.insert(descriptor);
        }
    }
}
