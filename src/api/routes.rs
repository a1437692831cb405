//! API route definitions.
//!
//! Every success body is `{ "data": ..., "meta": {...} }`; errors are
//! `{ "error": "..." }` with a 4xx status.

use std::ops::RangeInclusive;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use crate::detect::{AlertQuery, AnomalyKind, Severity};
use crate::forecast::HORIZON_RANGE;
use crate::telemetry::FloorId;

const DEFAULT_HISTORY_LIMIT: usize = 60;
const DEFAULT_MINUTES_AHEAD: u32 = 60;
const HISTORY_LIMIT_RANGE: RangeInclusive<usize> = 1..=1440;
const ALERT_LIMIT_RANGE: RangeInclusive<usize> = 1..=100;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/floors", get(list_floors))
        .route("/floors/{id}", get(get_floor))
        .route("/floors/{id}/history", get(floor_history))
        .route("/floors/{id}/predictions", get(floor_predictions))
        .route("/alerts", get(list_alerts))
        .route("/stats", get(building_stats))
        .route("/notifications/stats", get(notification_stats))
        .route("/notifications/cooldowns/clear", post(clear_cooldowns))
        .route("/notifications/rate-limit/clear", post(clear_rate_limiting))
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn envelope(data: Value, meta: Value) -> Json<Value> {
    let mut meta = meta;
    if let Value::Object(map) = &mut meta {
        map.insert(
            "timestamp".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
    Json(json!({ "data": data, "meta": meta }))
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Reject query values outside `range`.
fn bounded<T>(name: &str, value: T, range: &RangeInclusive<T>) -> Result<T, ApiError>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            value
        )))
    }
}

fn unknown_floor(id: FloorId) -> ApiError {
    ApiError::NotFound(format!("floor {} not found", id))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    envelope(
        json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "floors": state.monitor.floor_count(),
        }),
        json!({ "version": env!("CARGO_PKG_VERSION") }),
    )
}

async fn list_floors(State(state): State<AppState>) -> Json<Value> {
    let floors = state.monitor.current_data();
    let total = floors.len();
    envelope(to_value(&floors), json!({ "total": total }))
}

async fn get_floor(
    State(state): State<AppState>,
    Path(id): Path<FloorId>,
) -> Result<Json<Value>, ApiError> {
    let floor = state.monitor.floor(id).ok_or_else(|| unknown_floor(id))?;
    Ok(envelope(to_value(&floor), json!({})))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

async fn floor_history(
    State(state): State<AppState>,
    Path(id): Path<FloorId>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Value>, ApiError> {
    let limit = bounded(
        "limit",
        params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        &HISTORY_LIMIT_RANGE,
    )?;
    state.monitor.floor(id).ok_or_else(|| unknown_floor(id))?;
    let history = state.monitor.floor_history(id, limit);
    let count = history.len();
    Ok(envelope(
        to_value(&history),
        json!({ "floorId": id, "limit": limit, "count": count }),
    ))
}

#[derive(Debug, Deserialize)]
struct PredictionParams {
    minutes_ahead: Option<u32>,
}

async fn floor_predictions(
    State(state): State<AppState>,
    Path(id): Path<FloorId>,
    Query(params): Query<PredictionParams>,
) -> Result<Json<Value>, ApiError> {
    let minutes_ahead = bounded(
        "minutes_ahead",
        params.minutes_ahead.unwrap_or(DEFAULT_MINUTES_AHEAD),
        &HORIZON_RANGE,
    )?;
    let forecast = state
        .monitor
        .forecast_floor(id, minutes_ahead)
        .ok_or_else(|| unknown_floor(id))?;
    Ok(envelope(
        to_value(&forecast),
        json!({ "floorId": id, "minutesAhead": minutes_ahead }),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct AlertParams {
    severity: Option<String>,
    floor_id: Option<FloorId>,
    #[serde(rename = "type")]
    kind: Option<String>,
    limit: Option<usize>,
}

impl AlertParams {
    fn into_query(self) -> Result<AlertQuery, ApiError> {
        let severity = self
            .severity
            .map(|s| s.parse::<Severity>())
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let kind = self
            .kind
            .map(|k| k.parse::<AnomalyKind>())
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let limit = self
            .limit
            .map(|l| bounded("limit", l, &ALERT_LIMIT_RANGE))
            .transpose()?;
        Ok(AlertQuery {
            severity,
            floor_id: self.floor_id,
            kind,
            limit,
        })
    }
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertParams>,
) -> Result<Json<Value>, ApiError> {
    let query = params.into_query()?;
    let alerts = state.monitor.query_alerts(&query);
    let total = alerts.len();
    Ok(envelope(to_value(&alerts), json!({ "total": total })))
}

async fn building_stats(State(state): State<AppState>) -> Json<Value> {
    envelope(to_value(&state.monitor.stats()), json!({}))
}

async fn notification_stats(State(state): State<AppState>) -> Json<Value> {
    envelope(to_value(&state.monitor.notification_stats().await), json!({}))
}

async fn clear_cooldowns(State(state): State<AppState>) -> Json<Value> {
    state.monitor.clear_cooldowns().await;
    envelope(json!({ "cleared": "cooldowns" }), json!({}))
}

async fn clear_rate_limiting(State(state): State<AppState>) -> Json<Value> {
    state.monitor.clear_rate_limiting().await;
    envelope(json!({ "cleared": "rate_limit" }), json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_params_parse() {
        let query = AlertParams {
            severity: Some("Critical".to_string()),
            floor_id: Some(2),
            kind: Some("thermal_overload".to_string()),
            limit: Some(5),
        }
        .into_query()
        .unwrap();
        assert_eq!(query.severity, Some(Severity::Critical));
        assert_eq!(query.kind, Some(AnomalyKind::ThermalOverload));
        assert_eq!(query.floor_id, Some(2));
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn test_bad_alert_params_rejected() {
        let bad = AlertParams {
            severity: Some("fatal".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.into_query(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_alert_limit_bounds() {
        for limit in [0, 101] {
            let params = AlertParams {
                limit: Some(limit),
                ..Default::default()
            };
            assert!(matches!(params.into_query(), Err(ApiError::BadRequest(_))));
        }
        let params = AlertParams {
            limit: Some(100),
            ..Default::default()
        };
        assert_eq!(params.into_query().unwrap().limit, Some(100));
    }

    #[test]
    fn test_bounded_message() {
        match bounded("minutes_ahead", 9u32, &HORIZON_RANGE) {
            Err(ApiError::BadRequest(m)) => {
                assert_eq!(m, "minutes_ahead must be between 10 and 180, got 9")
            }
            other => panic!("expected bad request, got {:?}", other),
        }
        assert_eq!(bounded("minutes_ahead", 180u32, &HORIZON_RANGE).unwrap(), 180);
    }

    #[test]
    fn test_envelope_has_timestamp() {
        let Json(body) = envelope(json!([1, 2]), json!({ "total": 2 }));
        assert_eq!(body["data"], json!([1, 2]));
        assert_eq!(body["meta"]["total"], 2);
        assert!(body["meta"]["timestamp"].is_string());
    }
}
