//! Synthetic floor telemetry -- readings, bounded history, and the generator.

pub mod generator;
pub mod history;

pub use self::generator::TelemetryGenerator;
pub use self::history::FloorHistory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable floor identifier, 1..=N.
pub type FloorId = u32;

/// Default retention cap: 24 hours at one sample per minute.
pub const DEFAULT_HISTORY_CAP: usize = 1440;

/// One sample for one floor. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorReading {
    pub floor_id: FloorId,
    pub name: String,
    /// People on the floor.
    pub occupancy: u32,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: u32,
    /// kWh.
    pub power_consumption: f64,
    pub timestamp: DateTime<Utc>,
}

impl FloorReading {
    /// Value of `metric` as a float, for the forecaster and the rules.
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Occupancy => self.occupancy as f64,
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity as f64,
            Metric::PowerConsumption => self.power_consumption,
        }
    }
}

/// The metrics sampled for every floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Occupancy,
    Temperature,
    Humidity,
    PowerConsumption,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Occupancy => write!(f, "occupancy"),
            Metric::Temperature => write!(f, "temperature"),
            Metric::Humidity => write!(f, "humidity"),
            Metric::PowerConsumption => write!(f, "powerConsumption"),
        }
    }
}

/// Round `value` to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(23.456, 1), 23.5);
        assert_eq!(round_to(187.12345, 2), 187.12);
        assert_eq!(round_to(0.5, 0), 1.0);
    }

    #[test]
    fn test_reading_serializes_camel_case() {
        let reading = FloorReading {
            floor_id: 2,
            name: "Floor 2".to_string(),
            occupancy: 40,
            temperature: 22.5,
            humidity: 45,
            power_consumption: 159.5,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["floorId"], 2);
        assert_eq!(json["powerConsumption"], 159.5);
        assert_eq!(reading.metric(Metric::Humidity), 45.0);
    }
}
