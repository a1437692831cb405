//! The monitor: one owned instance per process tying the generator, the
//! forecaster, the anomaly engine and the notifier together.
//!
//! A tick samples every floor, evaluates the observed rules against each
//! floor's recent history, forecasts every floor and evaluates the
//! predictive rules. Ticks are serialized by the caller.

pub mod driver;

pub use self::driver::{run_tick_loop, TickEvent};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::detect::{Alert, AlertQuery, AnomalyEngine, Severity};
use crate::dispatch::{DispatchError, DispatchStats, Dispatcher, Notifier, NotifyOutcome};
use crate::forecast::{self, FloorForecast, FORECAST_WINDOW};
use crate::telemetry::{round_to, FloorId, FloorReading, TelemetryGenerator};

/// Prior readings handed to the observed rules.
pub const DETECTION_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorForecastEntry {
    pub floor_id: FloorId,
    pub forecast: FloorForecast,
}

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub timestamp: DateTime<Utc>,
    pub readings: Vec<FloorReading>,
    pub observed_alerts: Vec<Alert>,
    pub predictive_alerts: Vec<Alert>,
    pub forecasts: Vec<FloorForecastEntry>,
}

impl TickReport {
    /// Observed and predictive alerts at critical severity.
    pub fn critical_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.observed_alerts
            .iter()
            .chain(&self.predictive_alerts)
            .filter(|a| a.severity == Severity::Critical)
    }
}

/// Building-wide aggregates over the latest readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingStats {
    pub building_name: String,
    pub total_floors: usize,
    pub total_occupancy: u32,
    pub average_occupancy: f64,
    pub average_temperature: f64,
    pub total_power_consumption: f64,
    pub active_alerts: usize,
    pub timestamp: DateTime<Utc>,
}

pub struct Monitor {
    generator: RwLock<TelemetryGenerator>,
    engine: AnomalyEngine,
    notifier: Arc<dyn Notifier>,
    horizon_minutes: u32,
}

impl Monitor {
    pub fn new(
        generator: TelemetryGenerator,
        engine: AnomalyEngine,
        notifier: Arc<dyn Notifier>,
        horizon_minutes: u32,
    ) -> Self {
        Self {
            generator: RwLock::new(generator),
            engine,
            notifier,
            horizon_minutes,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, DispatchError> {
        let generator = TelemetryGenerator::new(
            config.building.floors,
            config.building.name.clone(),
            config.simulation.history_cap,
            config.simulation.seed,
        );
        let engine =
            AnomalyEngine::new(config.thresholds.clone()).with_max_age(config.retention.max_age());
        let notifier = Arc::new(Dispatcher::from_config(&config.notifications)?);
        Ok(Self::new(
            generator,
            engine,
            notifier,
            config.simulation.horizon_minutes,
        ))
    }

    pub fn horizon_minutes(&self) -> u32 {
        self.horizon_minutes
    }

    pub fn building_name(&self) -> String {
        self.generator.read().building_name().to_string()
    }

    pub fn floor_count(&self) -> usize {
        self.generator.read().floor_count()
    }

    /// Run one tick at the current instant.
    pub fn generate_tick(&self) -> TickReport {
        self.generate_tick_at(Utc::now())
    }

    pub fn generate_tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let readings = self.generator.write().generate_at(now);

        let mut observed_alerts = Vec::new();
        let mut predictive_alerts = Vec::new();
        let mut forecasts = Vec::with_capacity(readings.len());

        for reading in &readings {
            let recent = self
                .generator
                .read()
                .floor_history(reading.floor_id, DETECTION_HISTORY.max(FORECAST_WINDOW));

            let prior = prior_readings(&recent);
            if let Some(alert) = self.engine.generate_alert(reading.floor_id, reading, prior) {
                observed_alerts.push(alert);
            }

            let forecast = forecast::forecast_floor(&recent, self.horizon_minutes);
            if let Some(alert) = self.engine.generate_predictive_alert_at(
                reading.floor_id,
                &reading.name,
                &forecast,
                reading.power_consumption,
                now,
            ) {
                predictive_alerts.push(alert);
            }
            forecasts.push(FloorForecastEntry {
                floor_id: reading.floor_id,
                forecast,
            });
        }

        info!(
            floors = readings.len(),
            observed_alerts = observed_alerts.len(),
            predictive_alerts = predictive_alerts.len(),
            "Tick complete"
        );

        TickReport {
            timestamp: now,
            readings,
            observed_alerts,
            predictive_alerts,
            forecasts,
        }
    }

    /// Hand each critical alert of `report` to the notifier on its own task.
    /// Outcomes are logged; the handles are returned for callers that want
    /// to wait. Must be called inside a Tokio runtime.
    pub fn dispatch_critical(&self, report: &TickReport) -> Vec<JoinHandle<NotifyOutcome>> {
        report
            .critical_alerts()
            .cloned()
            .map(|alert| {
                let notifier = Arc::clone(&self.notifier);
                tokio::spawn(async move {
                    let outcome = notifier.notify(&alert).await;
                    if outcome.sent {
                        info!(
                            floor_id = alert.floor_id,
                            recipients = outcome.recipients,
                            "Critical alert dispatched"
                        );
                    } else {
                        warn!(
                            floor_id = alert.floor_id,
                            reason = outcome.reason.as_deref().unwrap_or("unknown"),
                            "Critical alert not dispatched"
                        );
                    }
                    outcome
                })
            })
            .collect()
    }

    pub fn current_data(&self) -> Vec<FloorReading> {
        self.generator.read().current_data()
    }

    pub fn floor(&self, floor_id: FloorId) -> Option<FloorReading> {
        self.current_data()
            .into_iter()
            .find(|r| r.floor_id == floor_id)
    }

    pub fn floor_history(&self, floor_id: FloorId, limit: usize) -> Vec<FloorReading> {
        self.generator.read().floor_history(floor_id, limit)
    }

    /// Forecast a floor from its latest readings. `None` for unknown floors.
    pub fn forecast_floor(&self, floor_id: FloorId, horizon_minutes: u32) -> Option<FloorForecast> {
        self.floor(floor_id)?;
        let history = self.floor_history(floor_id, FORECAST_WINDOW);
        Some(forecast::forecast_floor(&history, horizon_minutes))
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.engine.alerts()
    }

    pub fn query_alerts(&self, query: &AlertQuery) -> Vec<Alert> {
        self.engine.query(query)
    }

    pub fn clean_old_alerts(&self) -> usize {
        self.engine.clean_old_alerts()
    }

    pub fn stats(&self) -> BuildingStats {
        let floors = self.current_data();
        let total_floors = floors.len();
        let total_occupancy: u32 = floors.iter().map(|f| f.occupancy).sum();
        let (average_occupancy, average_temperature) = if total_floors == 0 {
            (0.0, 0.0)
        } else {
            let n = total_floors as f64;
            (
                round_to(total_occupancy as f64 / n, 1),
                round_to(floors.iter().map(|f| f.temperature).sum::<f64>() / n, 1),
            )
        };
        let total_power: f64 = floors.iter().map(|f| f.power_consumption).sum();

        BuildingStats {
            building_name: self.building_name(),
            total_floors,
            total_occupancy,
            average_occupancy,
            average_temperature,
            total_power_consumption: round_to(total_power, 2),
            active_alerts: self.engine.len(),
            timestamp: Utc::now(),
        }
    }

    pub async fn clear_cooldowns(&self) {
        self.notifier.clear_cooldowns().await;
    }

    pub async fn clear_rate_limiting(&self) {
        self.notifier.clear_rate_limiting().await;
    }

    pub async fn notification_stats(&self) -> DispatchStats {
        self.notifier.stats().await
    }
}

/// Up to [`DETECTION_HISTORY`] readings before the newest one in `recent`.
/// The newest entry is the reading under evaluation.
fn prior_readings(recent: &[FloorReading]) -> &[FloorReading] {
    let prior = &recent[..recent.len().saturating_sub(1)];
    &prior[prior.len().saturating_sub(DETECTION_HISTORY)..]
}
