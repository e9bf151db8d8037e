//! ==============================================================================
//! domain.rs - shared data model
//! ==============================================================================
//!
//! purpose:
//!     the plain data types every other module passes around: the operator
//!     record, alert thresholds, synthetic sensor readings, the ui theme and
//!     the normal/warning/critical classification.
//!
//! relationships:
//!     - used by: session.rs, thresholds.rs, theme.rs, telemetry.rs, server.rs
//!     - serialized into: storage.rs values (`user`, `thresholds`, `theme`)
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// the logged-in operator, persisted under the `user` key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self { id: None, email: email.into(), name: None }
    }

    /// name if known, email otherwise
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

// ==============================================================================
// thresholds
// ==============================================================================

/// operator-configurable alert thresholds
///
/// serialized with the camelCase keys the persisted value has always used
/// (`{"pressure":200,"temperature":80,"flowRate":300}`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSettings {
    /// pressure in PSI
    pub pressure: f64,
    /// temperature in celsius
    pub temperature: f64,
    /// flow rate in L/min
    pub flow_rate: f64,
}

impl ThresholdSettings {
    pub const PRESSURE_RANGE: RangeInclusive<f64> = 100.0..=300.0;
    pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 50.0..=100.0;
    pub const FLOW_RATE_RANGE: RangeInclusive<f64> = 150.0..=350.0;

    pub fn new(pressure: f64, temperature: f64, flow_rate: f64) -> Self {
        Self { pressure, temperature, flow_rate }
    }

    /// first field that falls outside its allowed range, if any
    pub fn out_of_range(&self) -> Option<(Metric, f64)> {
        [
            (Metric::Pressure, self.pressure, Self::PRESSURE_RANGE),
            (Metric::Temperature, self.temperature, Self::TEMPERATURE_RANGE),
            (Metric::FlowRate, self.flow_rate, Self::FLOW_RATE_RANGE),
        ]
        .into_iter()
        .find(|(_, value, range)| !range.contains(value))
        .map(|(metric, value, _)| (metric, value))
    }
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self { pressure: 200.0, temperature: 80.0, flow_rate: 300.0 }
    }
}

// ==============================================================================
// sensor readings
// ==============================================================================

/// the measured quantities of a pipeline segment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Pressure,
    Temperature,
    FlowRate,
    Vibration,
    Humidity,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Pressure,
        Metric::Temperature,
        Metric::FlowRate,
        Metric::Vibration,
        Metric::Humidity,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::Pressure => "Pressure",
            Metric::Temperature => "Temperature",
            Metric::FlowRate => "Flow Rate",
            Metric::Vibration => "Vibration",
            Metric::Humidity => "Humidity",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Pressure => "PSI",
            Metric::Temperature => "°C",
            Metric::FlowRate => "L/min",
            Metric::Vibration => "mm/s",
            Metric::Humidity => "%",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// inclusive generation range for one metric
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// a single synthetic reading; never persisted
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// reading timestamp in milliseconds
    pub timestamp: u64,
    pub pressure: f64,
    pub temperature: f64,
    pub flow_rate: f64,
    pub vibration: f64,
    pub humidity: f64,
}

impl SensorReading {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Pressure => self.pressure,
            Metric::Temperature => self.temperature,
            Metric::FlowRate => self.flow_rate,
            Metric::Vibration => self.vibration,
            Metric::Humidity => self.humidity,
        }
    }

    /// `HH:MM:SS` label used on chart x axes
    pub fn time_label(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.timestamp as i64)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string())
    }
}

// ==============================================================================
// classification
// ==============================================================================

/// ordered by severity so `max()` gives the worst status
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Normal,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Normal => "normal",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// theme
// ==============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown theme '{0}'")]
pub struct UnknownTheme(pub String);

impl FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(UnknownTheme(other.to_string())),
        }
    }
}
