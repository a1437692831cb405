//! Observed-reading rules.
//!
//! Each rule returns at most one anomaly and checks its highest tier first.
//! Rules are stateless: an anomaly exists only for the reading that crosses
//! the threshold. A non-finite metric makes its rule stay quiet instead of
//! failing the whole evaluation.

use chrono::{DateTime, Utc};

use super::thresholds::Thresholds;
use super::{Anomaly, AnomalyKind, AnomalyValue, Severity};
use crate::telemetry::{FloorId, FloorReading};

/// Run every rule against `current`. `history` holds the floor's readings
/// before `current`, oldest first.
///
/// Order: occupancy, temperature, humidity, power (or thermal overload),
/// sudden change.
pub fn detect_anomalies(
    thresholds: &Thresholds,
    current: &FloorReading,
    history: &[FloorReading],
) -> Vec<Anomaly> {
    [
        check_occupancy(thresholds, current, history),
        check_temperature(thresholds, current),
        check_humidity(thresholds, current),
        check_power(thresholds, current),
        check_sudden_change(thresholds, current, history),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn check_occupancy(
    thresholds: &Thresholds,
    current: &FloorReading,
    history: &[FloorReading],
) -> Option<Anomaly> {
    let t = &thresholds.occupancy;
    let occupancy = current.occupancy;
    let floor = current.floor_id;

    if occupancy >= t.very_high {
        let relocate = (occupancy.saturating_sub(t.high) as f64 / 2.0).round();
        return Some(observed(
            current,
            AnomalyKind::Occupancy,
            Severity::Critical,
            "Occupancy",
            AnomalyValue::Scalar(occupancy as f64),
            format!("Critical occupancy: {} people", occupancy),
            format!(
                "CRITICAL: Boost ventilation on Floor {} now. Move {} people to Floor {} within 15 min and watch maximum capacity.",
                floor,
                relocate,
                neighbor_floor(floor)
            ),
        ));
    }

    if occupancy >= t.high {
        return Some(observed(
            current,
            AnomalyKind::Occupancy,
            Severity::Warning,
            "Occupancy",
            AnomalyValue::Scalar(occupancy as f64),
            format!("High occupancy: {} people", occupancy),
            format!(
                "Prepare ventilation on Floor {}. Set the setpoint to 23°C within 20 min and monitor thermal comfort.",
                floor
            ),
        ));
    }

    if t.deviation_window > 0 && history.len() >= t.deviation_window {
        let window = &history[history.len() - t.deviation_window..];
        let average =
            window.iter().map(|r| r.occupancy as f64).sum::<f64>() / window.len() as f64;
        let deviation = (occupancy as f64 - average).abs();
        if deviation > t.deviation && occupancy as f64 > average {
            return Some(observed(
                current,
                AnomalyKind::Occupancy,
                Severity::Info,
                "Occupancy",
                AnomalyValue::Scalar(occupancy as f64),
                format!(
                    "Unusual occupancy increase ({} people above the recent average)",
                    deviation.round()
                ),
                format!(
                    "Check for a scheduled event on Floor {}. Pre-cool to 23°C within 15 min.",
                    floor
                ),
            ));
        }
    }

    None
}

pub fn check_temperature(thresholds: &Thresholds, current: &FloorReading) -> Option<Anomaly> {
    let t = &thresholds.temperature;
    let temperature = finite(current.temperature)?;
    let floor = current.floor_id;
    let value = AnomalyValue::Scalar(temperature);

    if temperature >= t.critical {
        let target = (temperature - 4.0).max(22.0);
        return Some(observed(
            current,
            AnomalyKind::Temperature,
            Severity::Critical,
            "Temperature",
            value,
            format!("Critical temperature: {:.1}°C", temperature),
            format!(
                "CRITICAL: Set Floor {} setpoint to {:.1}°C now. Run cooling at maximum and reduce occupancy if possible.",
                floor, target
            ),
        ));
    }

    if temperature >= t.warning {
        return Some(observed(
            current,
            AnomalyKind::Temperature,
            Severity::Warning,
            "Temperature",
            value,
            format!("High temperature: {:.1}°C", temperature),
            format!(
                "Set Floor {} setpoint to 24°C within 15 min. Increase ventilation on Floor {}; check doors and louvers.",
                floor, floor
            ),
        ));
    }

    if temperature >= t.info {
        return Some(observed(
            current,
            AnomalyKind::Temperature,
            Severity::Info,
            "Temperature",
            value,
            format!("Temperature above the optimal range: {:.1}°C", temperature),
            format!(
                "Monitor temperature on Floor {}. Consider a 24°C setpoint within 20 min if it keeps rising.",
                floor
            ),
        ));
    }

    if temperature <= t.low {
        return Some(observed(
            current,
            AnomalyKind::Temperature,
            Severity::Warning,
            "Temperature",
            value,
            format!("Low temperature: {:.1}°C", temperature),
            format!(
                "Set Floor {} setpoint to 21°C. Turn on heating and inspect thermal insulation.",
                floor
            ),
        ));
    }

    if current.occupancy > t.decoupling_min_occupancy && temperature < t.decoupling_max_temp {
        return Some(observed(
            current,
            AnomalyKind::Temperature,
            Severity::Info,
            "Temperature",
            value,
            "Temperature unusually low for high occupancy".to_string(),
            format!(
                "Schedule a thermal seal inspection on Floor {}. Check the HVAC for overcooling.",
                floor
            ),
        ));
    }

    None
}

pub fn check_humidity(thresholds: &Thresholds, current: &FloorReading) -> Option<Anomaly> {
    let t = &thresholds.humidity;
    let humidity = current.humidity as f64;
    let floor = current.floor_id;

    let (severity, message, recommendation) = if humidity > t.high_critical {
        (
            Severity::Critical,
            format!("Critical humidity: {}%", current.humidity),
            format!("CRITICAL: Start dehumidifiers on Floor {} now and run ventilation at maximum. High humidity affects comfort and equipment.", floor),
        )
    } else if humidity > t.high_warning {
        (
            Severity::Warning,
            format!("High humidity: {}%", current.humidity),
            format!("Increase ventilation on Floor {} within 20 min. Check air-conditioning filters and windows.", floor),
        )
    } else if humidity > t.high_info {
        (
            Severity::Info,
            format!("Humidity above the optimal range: {}%", current.humidity),
            format!("Monitor humidity on Floor {}. Consider dehumidifying if it keeps rising over the next 30 min.", floor),
        )
    } else if humidity < t.low_critical {
        (
            Severity::Critical,
            format!("Critically low humidity: {}%", current.humidity),
            format!("CRITICAL: Start humidifiers on Floor {} now. Very dry air affects health and comfort.", floor),
        )
    } else if humidity < t.low_warning {
        (
            Severity::Warning,
            format!("Low humidity: {}%", current.humidity),
            format!("Start humidifiers on Floor {}. Dry air affects health and comfort.", floor),
        )
    } else if humidity < t.low_info {
        (
            Severity::Info,
            format!("Humidity below the optimal range: {}%", current.humidity),
            format!("Monitor humidity on Floor {}. Consider humidifying if it keeps falling.", floor),
        )
    } else {
        return None;
    };

    Some(observed(
        current,
        AnomalyKind::Humidity,
        severity,
        "Humidity",
        AnomalyValue::Scalar(humidity),
        message,
        recommendation,
    ))
}

/// Power tiers. A thermal overload takes the slot and suppresses the plain
/// power anomaly.
pub fn check_power(thresholds: &Thresholds, current: &FloorReading) -> Option<Anomaly> {
    if let Some(thermal) = check_thermal_overload(thresholds, current) {
        return Some(thermal);
    }

    let t = &thresholds.power;
    let power = finite(current.power_consumption)?;
    let floor = current.floor_id;

    if power >= t.very_high {
        return Some(observed(
            current,
            AnomalyKind::Power,
            Severity::Critical,
            "Power Consumption",
            AnomalyValue::Scalar(power),
            format!("Very high power consumption: {:.2} kWh", power),
            format!(
                "CRITICAL: Shift electrical load from Floor {} to Floor {} within the hour. Inspect electrical systems for faults or waste.",
                floor,
                neighbor_floor(floor)
            ),
        ));
    }

    if power >= t.high {
        return Some(observed(
            current,
            AnomalyKind::Power,
            Severity::Warning,
            "Power Consumption",
            AnomalyValue::Scalar(power),
            format!("High power consumption: {:.2} kWh", power),
            format!(
                "Trim equipment use on Floor {} within 30 min. Switch off idle lights and devices; review HVAC settings.",
                floor
            ),
        ));
    }

    if current.occupancy < t.waste_max_occupancy && power > t.waste_min_power {
        let savings = ((power - 50.0) * 0.3).round();
        return Some(observed(
            current,
            AnomalyKind::Power,
            Severity::Warning,
            "Power Consumption",
            AnomalyValue::Scalar(power),
            format!("High consumption with low occupancy on Floor {}", floor),
            format!(
                "Look for equipment left on at Floor {}. Up to {} kWh could be saved; schedule automatic light shutoff.",
                floor, savings
            ),
        ));
    }

    None
}

/// Composite temperature + power risk.
pub fn check_thermal_overload(thresholds: &Thresholds, current: &FloorReading) -> Option<Anomaly> {
    let t = &thresholds.thermal;
    let temperature = finite(current.temperature)?;
    let power = finite(current.power_consumption)?;
    let composite = AnomalyValue::Composite {
        temperature,
        power_consumption: power,
        occupancy: None,
    };

    if temperature >= t.critical_temp && power >= t.critical_power {
        return Some(observed(
            current,
            AnomalyKind::ThermalOverload,
            Severity::Critical,
            "Thermal Overload Risk",
            composite,
            format!("CRITICAL RISK: temperature {:.1}°C with {:.2} kWh consumption", temperature, power),
            "IMMEDIATE ACTION: Thermal overload risk. Cut electrical load now, set the setpoint to 23°C and run ventilation at maximum. Move people off the floor if possible.".to_string(),
        ));
    }

    if temperature >= t.warning_temp && power >= t.warning_power {
        return Some(observed(
            current,
            AnomalyKind::ThermalOverload,
            Severity::Warning,
            "Thermal Overload Risk",
            composite,
            format!("Moderate risk: temperature {:.1}°C with {:.2} kWh consumption", temperature, power),
            "Watch closely for the next 30 min. Set the setpoint to 24°C, cut non-essential equipment and improve air circulation.".to_string(),
        ));
    }

    if temperature >= t.info_temp && power >= t.info_power && current.occupancy > t.info_occupancy {
        return Some(observed(
            current,
            AnomalyKind::ThermalOverload,
            Severity::Info,
            "Conditions Outside Optimal Range",
            AnomalyValue::Composite {
                temperature,
                power_consumption: power,
                occupancy: Some(current.occupancy),
            },
            format!(
                "Suboptimal conditions: {:.1}°C, {:.2} kWh, {} people",
                temperature, power, current.occupancy
            ),
            "Tune conditions within 45 min: adjust HVAC, check ventilation and consider moving 10-15 people to other floors.".to_string(),
        ));
    }

    None
}

/// Jump against the previous reading. Occupancy is checked before
/// temperature.
pub fn check_sudden_change(
    thresholds: &Thresholds,
    current: &FloorReading,
    history: &[FloorReading],
) -> Option<Anomaly> {
    let t = &thresholds.sudden_change;
    if history.len() < t.min_history.max(1) {
        return None;
    }
    let previous = history.last()?;
    let floor = current.floor_id;

    let occupancy_delta = current.occupancy as f64 - previous.occupancy as f64;
    if occupancy_delta.abs() > t.occupancy_delta {
        let (direction, action) = if occupancy_delta > 0.0 {
            (
                "Sudden increase",
                "Set HVAC to 23°C and add ventilation within 10 min",
            )
        } else {
            (
                "Sudden drop",
                "Reduce ventilation and set the setpoint to 24°C to save energy",
            )
        };
        return Some(observed(
            current,
            AnomalyKind::SuddenChange,
            Severity::Info,
            "Sudden Occupancy Change",
            AnomalyValue::Scalar(occupancy_delta.abs()),
            format!(
                "{} in occupancy on Floor {}: {:+} people",
                direction, floor, occupancy_delta
            ),
            format!(
                "Monitor Floor {}. {}. Check whether a scheduled event explains it.",
                floor, action
            ),
        ));
    }

    let (Some(now), Some(before)) = (finite(current.temperature), finite(previous.temperature))
    else {
        return None;
    };
    let temperature_delta = (now - before).abs();
    if temperature_delta > t.temperature_delta {
        return Some(observed(
            current,
            AnomalyKind::SuddenChange,
            Severity::Warning,
            "Sudden Temperature Change",
            AnomalyValue::Scalar(temperature_delta),
            format!(
                "Temperature moved {:.1}°C in one sample on Floor {}",
                temperature_delta, floor
            ),
            format!(
                "Inspect the HVAC on Floor {} now; a change this fast may be an equipment fault. Book a technical review within 2 hours.",
                floor
            ),
        ));
    }

    None
}

/// Floor that receives redistributed load: the one below, or the one above
/// for the first floor.
pub fn neighbor_floor(floor_id: FloorId) -> FloorId {
    if floor_id > 1 {
        floor_id - 1
    } else {
        floor_id + 1
    }
}

pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn observed(
    current: &FloorReading,
    kind: AnomalyKind,
    severity: Severity,
    metric: &str,
    value: AnomalyValue,
    message: String,
    recommendation: String,
) -> Anomaly {
    anomaly_at(current.timestamp, kind, severity, metric, value, message, recommendation)
}

pub(crate) fn anomaly_at(
    timestamp: DateTime<Utc>,
    kind: AnomalyKind,
    severity: Severity,
    metric: &str,
    value: AnomalyValue,
    message: String,
    recommendation: String,
) -> Anomaly {
    Anomaly {
        kind,
        severity,
        metric: metric.to_string(),
        value,
        message,
        recommendation,
        timestamp,
        minutes_ahead: None,
        predicted_time: None,
    }
}
