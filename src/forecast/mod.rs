//! Short-horizon forecasting from a floor's recent history.
//!
//! A cheap hybrid of a moving average and a least-squares trend line, blended
//! per metric and clamped to the metric's physical range. Pure functions only:
//! identical history and horizon always produce identical forecasts.

pub mod stats;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use self::stats::TimeSeries;
use crate::telemetry::{round_to, FloorReading, Metric};

/// Samples considered per forecast.
pub const FORECAST_WINDOW: usize = 30;
/// Samples averaged by the moving-average half of the blend.
pub const MOVING_AVERAGE_WINDOW: usize = 10;
/// Spacing between forecast points.
pub const STEP_MINUTES: u32 = 10;
/// Horizons accepted from configuration and the API.
pub const HORIZON_RANGE: std::ops::RangeInclusive<u32> = 10..=180;
/// Below this many samples the confidence stays at its floor.
const MIN_CONFIDENCE_SAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMethod {
    None,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub minutes_ahead: u32,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Projection of one metric over a horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub metric: Metric,
    pub predictions: Vec<ForecastPoint>,
    pub method: ForecastMethod,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<f64>,
}

impl Forecast {
    pub fn empty(metric: Metric) -> Self {
        Self {
            metric,
            predictions: Vec::new(),
            method: ForecastMethod::None,
            confidence: 0.0,
            current_value: None,
        }
    }
}

/// All per-metric forecasts for one floor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorForecast {
    pub occupancy: Forecast,
    pub temperature: Forecast,
    pub humidity: Forecast,
    pub power_consumption: Forecast,
}

impl FloorForecast {
    pub fn get(&self, metric: Metric) -> &Forecast {
        match metric {
            Metric::Occupancy => &self.occupancy,
            Metric::Temperature => &self.temperature,
            Metric::Humidity => &self.humidity,
            Metric::PowerConsumption => &self.power_consumption,
        }
    }
}

/// Blend weights, clamp range and output precision per metric.
struct Profile {
    average_weight: f64,
    trend_weight: f64,
    min: f64,
    max: f64,
    decimals: i32,
}

fn profile(metric: Metric) -> Profile {
    match metric {
        Metric::Occupancy => Profile {
            average_weight: 0.6,
            trend_weight: 0.4,
            min: 0.0,
            max: 100.0,
            decimals: 0,
        },
        Metric::Temperature => Profile {
            average_weight: 0.6,
            trend_weight: 0.4,
            min: 18.0,
            max: 30.0,
            decimals: 1,
        },
        Metric::Humidity => Profile {
            average_weight: 0.5,
            trend_weight: 0.5,
            min: 0.0,
            max: 100.0,
            decimals: 0,
        },
        Metric::PowerConsumption => Profile {
            average_weight: 0.5,
            trend_weight: 0.5,
            min: 0.0,
            max: f64::INFINITY,
            decimals: 2,
        },
    }
}

/// Forecast `metric` every [`STEP_MINUTES`] up to `horizon_minutes`.
///
/// Point timestamps are anchored on the newest sample, not the wall clock.
/// Non-finite samples are ignored.
pub fn forecast(history: &[FloorReading], metric: Metric, horizon_minutes: u32) -> Forecast {
    let recent = &history[history.len().saturating_sub(FORECAST_WINDOW)..];
    let Some(anchor) = recent.last().map(|r| r.timestamp) else {
        return Forecast::empty(metric);
    };

    let values: Vec<f64> = recent
        .iter()
        .map(|r| r.metric(metric))
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Forecast::empty(metric);
    }

    let series = TimeSeries::new(values);
    let average = series.moving_average(MOVING_AVERAGE_WINDOW);
    let trend = series.linear_regression();
    let profile = profile(metric);
    let n = series.len() as f64;

    let predictions = (1..=horizon_minutes / STEP_MINUTES)
        .map(|step| {
            let minutes_ahead = step * STEP_MINUTES;
            let projected = trend.predict(n + minutes_ahead as f64);
            let blended = average * profile.average_weight + projected * profile.trend_weight;
            ForecastPoint {
                minutes_ahead,
                value: round_to(blended.clamp(profile.min, profile.max), profile.decimals),
                timestamp: anchor + Duration::minutes(i64::from(minutes_ahead)),
            }
        })
        .collect();

    Forecast {
        metric,
        predictions,
        method: ForecastMethod::Hybrid,
        confidence: confidence(recent),
        current_value: series.last(),
    }
}

/// Forecast every metric of a floor over the same horizon.
pub fn forecast_floor(history: &[FloorReading], horizon_minutes: u32) -> FloorForecast {
    FloorForecast {
        occupancy: forecast(history, Metric::Occupancy, horizon_minutes),
        temperature: forecast(history, Metric::Temperature, horizon_minutes),
        humidity: forecast(history, Metric::Humidity, horizon_minutes),
        power_consumption: forecast(history, Metric::PowerConsumption, horizon_minutes),
    }
}

/// Lower occupancy spread means higher confidence, bounded to [0.5, 0.95].
/// Always derived from occupancy, whichever metric is being forecast.
fn confidence(recent: &[FloorReading]) -> f64 {
    if recent.len() < MIN_CONFIDENCE_SAMPLES {
        return 0.5;
    }
    let occupancy = TimeSeries::new(recent.iter().map(|r| r.occupancy as f64).collect());
    let raw = 1.0 - occupancy.std_dev() / 100.0;
    round_to(raw.clamp(0.5, 0.95), 2)
}
