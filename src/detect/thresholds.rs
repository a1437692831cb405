//! Rule cutoffs. Defaults are the production tiers; every section can be
//! overridden from the `[thresholds]` config table.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub occupancy: OccupancyThresholds,
    pub temperature: TemperatureThresholds,
    pub humidity: HumidityThresholds,
    pub power: PowerThresholds,
    pub thermal: ThermalThresholds,
    pub predictive_thermal: PredictiveThermalThresholds,
    pub sudden_change: SuddenChangeThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyThresholds {
    /// Warning at or above.
    pub high: u32,
    /// Critical at or above.
    pub very_high: u32,
    /// Info when more than this many people above the recent average.
    pub deviation: f64,
    /// Samples in the recent average.
    pub deviation_window: usize,
}

impl Default for OccupancyThresholds {
    fn default() -> Self {
        Self {
            high: 85,
            very_high: 95,
            deviation: 30.0,
            deviation_window: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureThresholds {
    pub info: f64,
    pub warning: f64,
    pub critical: f64,
    /// Warning at or below.
    pub low: f64,
    /// Crowded floor (occupancy above) that is still below `decoupling_max_temp`.
    pub decoupling_min_occupancy: u32,
    pub decoupling_max_temp: f64,
}

impl Default for TemperatureThresholds {
    fn default() -> Self {
        Self {
            info: 26.0,
            warning: 28.0,
            critical: 29.5,
            low: 18.0,
            decoupling_min_occupancy: 70,
            decoupling_max_temp: 21.0,
        }
    }
}

/// Strict bounds: high tiers fire above, low tiers below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumidityThresholds {
    pub high_info: f64,
    pub high_warning: f64,
    pub high_critical: f64,
    pub low_info: f64,
    pub low_warning: f64,
    pub low_critical: f64,
}

impl Default for HumidityThresholds {
    fn default() -> Self {
        Self {
            high_info: 70.0,
            high_warning: 75.0,
            high_critical: 80.0,
            low_info: 25.0,
            low_warning: 22.0,
            low_critical: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerThresholds {
    pub high: f64,
    pub very_high: f64,
    /// Waste: power above this with occupancy below `waste_max_occupancy`.
    pub waste_min_power: f64,
    pub waste_max_occupancy: u32,
}

impl Default for PowerThresholds {
    fn default() -> Self {
        Self {
            high: 150.0,
            very_high: 200.0,
            waste_min_power: 100.0,
            waste_max_occupancy: 20,
        }
    }
}

/// Composite temperature + power tiers on observed readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalThresholds {
    pub critical_temp: f64,
    pub critical_power: f64,
    pub warning_temp: f64,
    pub warning_power: f64,
    pub info_temp: f64,
    pub info_power: f64,
    /// Info tier also needs occupancy strictly above this.
    pub info_occupancy: u32,
}

impl Default for ThermalThresholds {
    fn default() -> Self {
        Self {
            critical_temp: 26.0,
            critical_power: 180.0,
            warning_temp: 25.0,
            warning_power: 150.0,
            info_temp: 24.0,
            info_power: 140.0,
            info_occupancy: 80,
        }
    }
}

/// Composite tiers on forecast points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictiveThermalThresholds {
    pub critical_temp: f64,
    pub critical_power: f64,
    pub warning_temp: f64,
    pub warning_power: f64,
}

impl Default for PredictiveThermalThresholds {
    fn default() -> Self {
        Self {
            critical_temp: 29.5,
            critical_power: 180.0,
            warning_temp: 28.0,
            warning_power: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuddenChangeThresholds {
    pub occupancy_delta: f64,
    pub temperature_delta: f64,
    pub min_history: usize,
}

impl Default for SuddenChangeThresholds {
    fn default() -> Self {
        Self {
            occupancy_delta: 30.0,
            temperature_delta: 3.0,
            min_history: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let t: Thresholds = toml::from_str(
            r#"
[power]
high = 160.0
"#,
        )
        .unwrap();
        assert_eq!(t.power.high, 160.0);
        assert_eq!(t.power.very_high, 200.0);
        assert_eq!(t.temperature.critical, 29.5);
        assert_eq!(t.sudden_change.min_history, 3);
    }
}
