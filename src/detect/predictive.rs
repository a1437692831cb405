//! Rules over forecast points.
//!
//! Each metric yields at most one anomaly: the earliest forecast point that
//! qualifies, with critical checked before warning at every point.

use chrono::{DateTime, Utc};

use super::rules::{anomaly_at, finite};
use super::thresholds::Thresholds;
use super::{Anomaly, AnomalyKind, AnomalyValue, Severity};
use crate::forecast::{FloorForecast, ForecastPoint};
use crate::telemetry::FloorId;

/// Every predictive finding for one floor, in order temperature, humidity,
/// power, thermal risk.
pub fn detect_predictive(
    thresholds: &Thresholds,
    floor_id: FloorId,
    forecast: &FloorForecast,
    now: DateTime<Utc>,
) -> Vec<Anomaly> {
    [
        check_predictive_temperature(thresholds, floor_id, &forecast.temperature.predictions, now),
        check_predictive_humidity(thresholds, floor_id, &forecast.humidity.predictions, now),
        check_predictive_power(thresholds, floor_id, &forecast.power_consumption.predictions, now),
        check_predictive_thermal_risk(
            thresholds,
            floor_id,
            &forecast.temperature.predictions,
            &forecast.power_consumption.predictions,
            now,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn check_predictive_temperature(
    thresholds: &Thresholds,
    floor_id: FloorId,
    points: &[ForecastPoint],
    now: DateTime<Utc>,
) -> Option<Anomaly> {
    let t = &thresholds.temperature;
    points.iter().find_map(|point| {
        let value = finite(point.value)?;
        if value >= t.critical {
            Some(predicted(
                now,
                point,
                AnomalyKind::PredictiveTemperature,
                Severity::Critical,
                "Temperature Forecast",
                AnomalyValue::Scalar(value),
                format!(
                    "PREVENTIVE ALERT: critical temperature of {:.1}°C expected in {} minutes",
                    value, point.minutes_ahead
                ),
                format!(
                    "PREVENTIVE ACTION: Set Floor {} setpoint to 22°C now. Start pre-cooling before the critical level is reached.",
                    floor_id
                ),
            ))
        } else if value >= t.warning {
            Some(predicted(
                now,
                point,
                AnomalyKind::PredictiveTemperature,
                Severity::Warning,
                "Temperature Forecast",
                AnomalyValue::Scalar(value),
                format!(
                    "Preventive alert: high temperature of {:.1}°C expected in {} minutes",
                    value, point.minutes_ahead
                ),
                format!(
                    "Prepare HVAC on Floor {}. Consider a 23°C setpoint within the next {} minutes.",
                    floor_id,
                    lead_time(point.minutes_ahead)
                ),
            ))
        } else {
            None
        }
    })
}

pub fn check_predictive_humidity(
    thresholds: &Thresholds,
    floor_id: FloorId,
    points: &[ForecastPoint],
    now: DateTime<Utc>,
) -> Option<Anomaly> {
    let t = &thresholds.humidity;
    points.iter().find_map(|point| {
        let value = finite(point.value)?;
        let (message, recommendation) = if value > t.high_critical {
            (
                format!(
                    "PREVENTIVE ALERT: critical humidity of {}% expected in {} minutes",
                    value, point.minutes_ahead
                ),
                format!(
                    "PREVENTIVE ACTION: Start dehumidifiers on Floor {} now and raise ventilation ahead of time.",
                    floor_id
                ),
            )
        } else if value < t.low_critical {
            (
                format!(
                    "PREVENTIVE ALERT: critically low humidity of {}% expected in {} minutes",
                    value, point.minutes_ahead
                ),
                format!(
                    "PREVENTIVE ACTION: Start humidifiers on Floor {} now to avoid very dry air.",
                    floor_id
                ),
            )
        } else {
            return None;
        };
        Some(predicted(
            now,
            point,
            AnomalyKind::PredictiveHumidity,
            Severity::Critical,
            "Humidity Forecast",
            AnomalyValue::Scalar(value),
            message,
            recommendation,
        ))
    })
}

pub fn check_predictive_power(
    thresholds: &Thresholds,
    floor_id: FloorId,
    points: &[ForecastPoint],
    now: DateTime<Utc>,
) -> Option<Anomaly> {
    let limit = thresholds.power.very_high;
    points.iter().find_map(|point| {
        let value = finite(point.value)?;
        (value >= limit).then(|| {
            predicted(
                now,
                point,
                AnomalyKind::PredictivePower,
                Severity::Critical,
                "Power Forecast",
                AnomalyValue::Scalar(value),
                format!(
                    "PREVENTIVE ALERT: critical consumption of {:.2} kWh expected in {} minutes",
                    value, point.minutes_ahead
                ),
                format!(
                    "PREVENTIVE ACTION: Redistribute electrical load from Floor {} now. Switch off non-essential equipment before an overload.",
                    floor_id
                ),
            )
        })
    })
}

/// Walk temperature and power points side by side and report the first step
/// where both are high. Later, worse steps are not considered.
pub fn check_predictive_thermal_risk(
    thresholds: &Thresholds,
    floor_id: FloorId,
    temperature: &[ForecastPoint],
    power: &[ForecastPoint],
    now: DateTime<Utc>,
) -> Option<Anomaly> {
    let t = &thresholds.predictive_thermal;
    temperature.iter().zip(power).find_map(|(temp_point, power_point)| {
        let temp = finite(temp_point.value)?;
        let watts = finite(power_point.value)?;
        let value = AnomalyValue::Composite {
            temperature: temp,
            power_consumption: watts,
            occupancy: None,
        };

        if temp >= t.critical_temp && watts >= t.critical_power {
            Some(predicted(
                now,
                temp_point,
                AnomalyKind::PredictiveThermalOverload,
                Severity::Critical,
                "Thermal Overload Forecast",
                value,
                format!(
                    "CRITICAL PREVENTIVE ALERT: Floor {} expected above {:.1}°C in {} minutes with {:.2} kWh consumption",
                    floor_id, temp, temp_point.minutes_ahead, watts
                ),
                format!(
                    "IMMEDIATE PREVENTIVE ACTION: Cut the thermal load on Floor {} now. Set the setpoint to 21°C, run ventilation at maximum and move heavy equipment to other floors.",
                    floor_id
                ),
            ))
        } else if temp >= t.warning_temp && watts >= t.warning_power {
            Some(predicted(
                now,
                temp_point,
                AnomalyKind::PredictiveThermalOverload,
                Severity::Warning,
                "Thermal Risk Forecast",
                value,
                format!(
                    "Preventive alert: thermal risk on Floor {} ({:.1}°C + {:.2} kWh) expected in {} minutes",
                    floor_id, temp, watts, temp_point.minutes_ahead
                ),
                format!(
                    "Prepare Floor {}: set HVAC to 23°C, review heavy equipment and improve ventilation within the next {} minutes.",
                    floor_id,
                    lead_time(temp_point.minutes_ahead)
                ),
            ))
        } else {
            None
        }
    })
}

fn lead_time(minutes_ahead: u32) -> u32 {
    minutes_ahead.saturating_sub(10).max(10)
}

#[allow(clippy::too_many_arguments)]
fn predicted(
    now: DateTime<Utc>,
    point: &ForecastPoint,
    kind: AnomalyKind,
    severity: Severity,
    metric: &str,
    value: AnomalyValue,
    message: String,
    recommendation: String,
) -> Anomaly {
    let mut anomaly = anomaly_at(now, kind, severity, metric, value, message, recommendation);
    anomaly.minutes_ahead = Some(point.minutes_ahead);
    anomaly.predicted_time = Some(point.timestamp);
    anomaly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{Forecast, ForecastMethod};
    use crate::telemetry::Metric;
    use chrono::Duration;

    fn points(values: &[f64]) -> Vec<ForecastPoint> {
        let start = Utc::now();
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let minutes_ahead = (i as u32 + 1) * 10;
                ForecastPoint {
                    minutes_ahead,
                    value,
                    timestamp: start + Duration::minutes(i64::from(minutes_ahead)),
                }
            })
            .collect()
    }

    fn forecast_of(metric: Metric, values: &[f64]) -> Forecast {
        Forecast {
            metric,
            predictions: points(values),
            method: ForecastMethod::Hybrid,
            confidence: 0.9,
            current_value: values.first().copied(),
        }
    }

    fn floor_forecast(temp: &[f64], humidity: &[f64], power: &[f64]) -> FloorForecast {
        FloorForecast {
            occupancy: forecast_of(Metric::Occupancy, &[50.0; 6]),
            temperature: forecast_of(Metric::Temperature, temp),
            humidity: forecast_of(Metric::Humidity, humidity),
            power_consumption: forecast_of(Metric::PowerConsumption, power),
        }
    }

    #[test]
    fn test_first_qualifying_point_wins() {
        let t = Thresholds::default();
        let found =
            check_predictive_temperature(&t, 2, &points(&[28.2, 29.8, 30.0]), Utc::now()).unwrap();
        assert_eq!(found.severity, Severity::Warning);
        assert_eq!(found.minutes_ahead, Some(10));
        assert_eq!(found.value, AnomalyValue::Scalar(28.2));
    }

    #[test]
    fn test_calm_forecast_has_no_findings() {
        let t = Thresholds::default();
        let f = floor_forecast(&[22.0; 6], &[50.0; 6], &[120.0; 6]);
        assert!(detect_predictive(&t, 1, &f, Utc::now()).is_empty());
    }

    #[test]
    fn test_humidity_only_critical_bands() {
        let t = Thresholds::default();
        let now = Utc::now();
        assert!(check_predictive_humidity(&t, 1, &points(&[78.0, 79.0]), now).is_none());
        let high = check_predictive_humidity(&t, 1, &points(&[78.0, 81.0]), now).unwrap();
        assert_eq!((high.severity, high.minutes_ahead), (Severity::Critical, Some(20)));
        let low = check_predictive_humidity(&t, 1, &points(&[19.0]), now).unwrap();
        assert_eq!(low.kind, AnomalyKind::PredictiveHumidity);
    }

    #[test]
    fn test_power_needs_critical_level() {
        let t = Thresholds::default();
        let now = Utc::now();
        assert!(check_predictive_power(&t, 1, &points(&[190.0, 199.99]), now).is_none());
        let found = check_predictive_power(&t, 1, &points(&[190.0, 200.0]), now).unwrap();
        assert_eq!(found.minutes_ahead, Some(20));
    }

    #[test]
    fn test_thermal_risk_stops_at_first_step() {
        let t = Thresholds::default();
        // Warning at step 10, critical at step 20
        let found = check_predictive_thermal_risk(
            &t,
            4,
            &points(&[28.5, 29.6]),
            &points(&[160.0, 190.0]),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(found.severity, Severity::Warning);
        assert_eq!(found.minutes_ahead, Some(10));
        assert_eq!(
            found.value,
            AnomalyValue::Composite {
                temperature: 28.5,
                power_consumption: 160.0,
                occupancy: None
            }
        );
    }

    #[test]
    fn test_predicted_time_matches_point() {
        let t = Thresholds::default();
        let temps = points(&[22.0, 29.9]);
        let found = check_predictive_temperature(&t, 1, &temps, Utc::now()).unwrap();
        assert_eq!(found.predicted_time, Some(temps[1].timestamp));
        assert_eq!(found.severity, Severity::Critical);
    }

    #[test]
    fn test_full_scan_order() {
        let t = Thresholds::default();
        let f = floor_forecast(&[29.6; 3], &[85.0; 3], &[210.0; 3]);
        let kinds: Vec<AnomalyKind> = detect_predictive(&t, 1, &f, Utc::now())
            .into_iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AnomalyKind::PredictiveTemperature,
                AnomalyKind::PredictiveHumidity,
                AnomalyKind::PredictivePower,
                AnomalyKind::PredictiveThermalOverload,
            ]
        );
    }
}
