//! Anomaly detection and alert aggregation.

pub mod engine;
pub mod predictive;
pub mod rules;
pub mod thresholds;

pub use self::engine::{AlertQuery, AnomalyEngine};
pub use self::thresholds::Thresholds;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::FloorId;

#[derive(Debug, Error, PartialEq)]
pub enum DetectError {
    #[error("unknown severity '{0}'")]
    UnknownSeverity(String),
    #[error("unknown anomaly type '{0}'")]
    UnknownAnomalyKind(String),
}

/// Severity levels, totally ordered: `Info < Warning < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info = 1,
    Warning = 2,
    Critical = 3,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(DetectError::UnknownSeverity(s.to_string())),
        }
    }
}

/// Rule that produced an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Occupancy,
    Temperature,
    Humidity,
    Power,
    ThermalOverload,
    SuddenChange,
    PredictiveTemperature,
    PredictiveHumidity,
    PredictivePower,
    PredictiveThermalOverload,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::Occupancy => "occupancy",
            AnomalyKind::Temperature => "temperature",
            AnomalyKind::Humidity => "humidity",
            AnomalyKind::Power => "power",
            AnomalyKind::ThermalOverload => "thermal_overload",
            AnomalyKind::SuddenChange => "sudden_change",
            AnomalyKind::PredictiveTemperature => "predictive_temperature",
            AnomalyKind::PredictiveHumidity => "predictive_humidity",
            AnomalyKind::PredictivePower => "predictive_power",
            AnomalyKind::PredictiveThermalOverload => "predictive_thermal_overload",
        }
    }

    pub fn is_predictive(&self) -> bool {
        matches!(
            self,
            AnomalyKind::PredictiveTemperature
                | AnomalyKind::PredictiveHumidity
                | AnomalyKind::PredictivePower
                | AnomalyKind::PredictiveThermalOverload
        )
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnomalyKind {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "occupancy" => AnomalyKind::Occupancy,
            "temperature" => AnomalyKind::Temperature,
            "humidity" => AnomalyKind::Humidity,
            "power" => AnomalyKind::Power,
            "thermal_overload" => AnomalyKind::ThermalOverload,
            "sudden_change" => AnomalyKind::SuddenChange,
            "predictive_temperature" => AnomalyKind::PredictiveTemperature,
            "predictive_humidity" => AnomalyKind::PredictiveHumidity,
            "predictive_power" => AnomalyKind::PredictivePower,
            "predictive_thermal_overload" => AnomalyKind::PredictiveThermalOverload,
            _ => return Err(DetectError::UnknownAnomalyKind(s.to_string())),
        };
        Ok(kind)
    }
}

/// Observed or predicted value behind an anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnomalyValue {
    Scalar(f64),
    #[serde(rename_all = "camelCase")]
    Composite {
        temperature: f64,
        power_consumption: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        occupancy: Option<u32>,
    },
}

/// One rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub metric: String,
    pub value: AnomalyValue,
    pub message: String,
    pub recommendation: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_ahead: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_time: Option<DateTime<Utc>>,
}

/// Whether an alert came from observed readings or from forecasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Observed,
    Predictive,
}

/// One or more anomalies for a floor at one evaluation instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: uuid::Uuid,
    pub floor_id: FloorId,
    pub floor_name: String,
    pub anomalies: Vec<Anomaly>,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: AlertKind,
}

/// Highest severity in `anomalies`, `None` when empty.
pub fn highest_severity(anomalies: &[Anomaly]) -> Option<Severity> {
    anomalies.iter().map(|a| a.severity).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anomaly(severity: Severity) -> Anomaly {
        Anomaly {
            kind: AnomalyKind::Humidity,
            severity,
            metric: "Humidity".to_string(),
            value: AnomalyValue::Scalar(72.0),
            message: String::new(),
            recommendation: String::new(),
            timestamp: Utc::now(),
            minutes_ahead: None,
            predicted_time: None,
        }
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!(Severity::Critical as u8, 3);
        assert_eq!("WARNING".parse::<Severity>(), Ok(Severity::Warning));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_highest_severity() {
        assert_eq!(highest_severity(&[]), None);
        let set = vec![
            anomaly(Severity::Info),
            anomaly(Severity::Critical),
            anomaly(Severity::Warning),
        ];
        assert_eq!(highest_severity(&set), Some(Severity::Critical));
        assert_eq!(
            highest_severity(&[anomaly(Severity::Info), anomaly(Severity::Warning)]),
            Some(Severity::Warning)
        );
    }

    #[test]
    fn test_anomaly_wire_shape() {
        let mut a = anomaly(Severity::Critical);
        a.kind = AnomalyKind::ThermalOverload;
        a.value = AnomalyValue::Composite {
            temperature: 27.0,
            power_consumption: 190.0,
            occupancy: None,
        };
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "thermal_overload");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["value"]["powerConsumption"], 190.0);
        assert!(json.get("minutesAhead").is_none());
        assert_eq!("thermal_overload".parse::<AnomalyKind>(), Ok(AnomalyKind::ThermalOverload));
    }
}
