//! The anomaly engine: runs the observed and predictive rules and keeps the
//! alert log that queries and retention work on.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::predictive::detect_predictive;
use super::rules::detect_anomalies;
use super::thresholds::Thresholds;
use super::{highest_severity, Alert, AlertKind, AnomalyKind, Severity};
use crate::forecast::FloorForecast;
use crate::telemetry::{FloorId, FloorReading};

/// Default alert retention.
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// Evaluates readings and forecasts and owns the alert log.
///
/// The log is append-only between retention sweeps. Readers take snapshots,
/// so a query never sees a half-written alert.
pub struct AnomalyEngine {
    thresholds: Thresholds,
    max_age: Duration,
    log: RwLock<Vec<Alert>>,
}

impl Default for AnomalyEngine {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl AnomalyEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            max_age: Duration::hours(DEFAULT_MAX_AGE_HOURS),
            log: RwLock::new(Vec::new()),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Evaluate `current` against the rules. `history` holds the floor's
    /// earlier readings, oldest first, not including `current`.
    ///
    /// Returns `None` for a quiet floor; otherwise the alert is appended to
    /// the log.
    pub fn generate_alert(
        &self,
        floor_id: FloorId,
        current: &FloorReading,
        history: &[FloorReading],
    ) -> Option<Alert> {
        let anomalies = detect_anomalies(&self.thresholds, current, history);
        let severity = highest_severity(&anomalies)?;

        let alert = Alert {
            id: uuid::Uuid::new_v4(),
            floor_id,
            floor_name: current.name.clone(),
            anomalies,
            timestamp: current.timestamp,
            severity,
            kind: AlertKind::Observed,
        };
        debug!(
            floor_id,
            severity = %alert.severity,
            anomalies = alert.anomalies.len(),
            "Observed alert raised"
        );
        self.log.write().push(alert.clone());
        Some(alert)
    }

    /// Evaluate a floor's forecasts. `current_power` is carried for callers
    /// that log it; the thermal scan uses the forecast power points.
    pub fn generate_predictive_alert(
        &self,
        floor_id: FloorId,
        floor_name: &str,
        forecast: &FloorForecast,
        current_power: f64,
    ) -> Option<Alert> {
        self.generate_predictive_alert_at(
            floor_id,
            floor_name,
            forecast,
            current_power,
            Utc::now(),
        )
    }

    /// As [`AnomalyEngine::generate_predictive_alert`], stamped at `now`.
    pub fn generate_predictive_alert_at(
        &self,
        floor_id: FloorId,
        floor_name: &str,
        forecast: &FloorForecast,
        current_power: f64,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let anomalies = detect_predictive(&self.thresholds, floor_id, forecast, now);
        let severity = highest_severity(&anomalies)?;

        let alert = Alert {
            id: uuid::Uuid::new_v4(),
            floor_id,
            floor_name: floor_name.to_string(),
            anomalies,
            timestamp: now,
            severity,
            kind: AlertKind::Predictive,
        };
        debug!(
            floor_id,
            severity = %alert.severity,
            current_power,
            "Predictive alert raised"
        );
        self.log.write().push(alert.clone());
        Some(alert)
    }

    /// Snapshot of the log in insertion order.
    pub fn alerts(&self) -> Vec<Alert> {
        self.log.read().clone()
    }

    pub fn len(&self) -> usize {
        self.log.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.read().is_empty()
    }

    /// Filtered snapshot, newest first.
    pub fn query(&self, query: &AlertQuery) -> Vec<Alert> {
        query.apply(&self.log.read())
    }

    /// Drop alerts older than the configured retention. Returns how many were
    /// removed.
    pub fn clean_old_alerts(&self) -> usize {
        self.clean_old_alerts_at(Utc::now())
    }

    pub fn clean_old_alerts_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.max_age;
        let mut log = self.log.write();
        let before = log.len();
        log.retain(|alert| alert.timestamp > cutoff);
        let removed = before - log.len();
        if removed > 0 {
            info!(removed, remaining = log.len(), "Expired alerts removed");
        }
        removed
    }
}

/// Filters for alert queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertQuery {
    pub severity: Option<Severity>,
    pub floor_id: Option<FloorId>,
    /// Matches alerts containing at least one anomaly of this kind.
    pub kind: Option<AnomalyKind>,
    pub limit: Option<usize>,
}

impl AlertQuery {
    pub fn apply(&self, alerts: &[Alert]) -> Vec<Alert> {
        let mut matched: Vec<Alert> = alerts
            .iter()
            .filter(|a| self.severity.map_or(true, |s| a.severity == s))
            .filter(|a| self.floor_id.map_or(true, |f| a.floor_id == f))
            .filter(|a| {
                self.kind
                    .map_or(true, |k| a.anomalies.iter().any(|anomaly| anomaly.kind == k))
            })
            .cloned()
            .collect();

        // Stable sort keeps insertion order for equal timestamps; reverse of
        // that puts the later insert first.
        matched.reverse();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}
