//! Webhook transport against a local axum receiver.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;

use smartfloors::config::{NotificationConfig, Recipients};
use smartfloors::detect::{Alert, AlertKind, Anomaly, AnomalyKind, AnomalyValue, Severity};
use smartfloors::dispatch::{Dispatcher, Notifier};

type Inbox = Arc<Mutex<Vec<Value>>>;

async fn receive(State(inbox): State<Inbox>, Json(body): Json<Value>) -> StatusCode {
    inbox.lock().push(body);
    StatusCode::NO_CONTENT
}

async fn spawn_receiver(status_route: bool) -> (String, Inbox) {
    let inbox: Inbox = Arc::default();
    let app = if status_route {
        Router::new().route("/hook", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
    } else {
        Router::new()
            .route("/hook", post(receive))
            .with_state(inbox.clone())
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/hook", addr), inbox)
}

fn critical_alert() -> Alert {
    Alert {
        id: uuid::Uuid::new_v4(),
        floor_id: 4,
        floor_name: "Floor 4".to_string(),
        anomalies: vec![Anomaly {
            kind: AnomalyKind::ThermalOverload,
            severity: Severity::Critical,
            metric: "Thermal Overload Risk".to_string(),
            value: AnomalyValue::Composite {
                temperature: 27.0,
                power_consumption: 190.0,
                occupancy: None,
            },
            message: "CRITICAL RISK".to_string(),
            recommendation: "Cut load".to_string(),
            timestamp: Utc::now(),
            minutes_ahead: None,
            predicted_time: None,
        }],
        timestamp: Utc::now(),
        severity: Severity::Critical,
        kind: AlertKind::Observed,
    }
}

fn config(url: String) -> NotificationConfig {
    NotificationConfig {
        enabled: true,
        webhook_url: Some(url),
        recipients: Recipients {
            critical: vec!["ops@example.com".to_string()],
            admin: vec!["admin@example.com".to_string()],
            ..Recipients::default()
        },
        ..NotificationConfig::default()
    }
}

#[tokio::test]
async fn test_webhook_receives_alert_payload() {
    let (url, inbox) = spawn_receiver(false).await;
    let dispatcher = Dispatcher::from_config(&config(url)).unwrap();

    let outcome = dispatcher.notify(&critical_alert()).await;
    assert!(outcome.sent, "{:?}", outcome);
    assert_eq!(outcome.recipients, 2);

    let received = inbox.lock().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["alert"]["floorId"], 4);
    assert_eq!(received[0]["alert"]["anomalies"][0]["type"], "thermal_overload");
    assert_eq!(received[0]["recipients"][1], "admin@example.com");
    assert!(received[0]["summary"]
        .as_str()
        .unwrap()
        .starts_with("[CRITICAL] Floor 4"));
    assert_eq!(dispatcher.stats().await.transport, "webhook");
}

#[tokio::test]
async fn test_webhook_error_status_is_not_sent() {
    let (url, _) = spawn_receiver(true).await;
    let dispatcher = Dispatcher::from_config(&config(url)).unwrap();

    let outcome = dispatcher.notify(&critical_alert()).await;
    assert!(!outcome.sent);
    assert_eq!(outcome.reason.as_deref(), Some("webhook returned status 500"));
    // Failed sends do not start a cooldown
    assert_eq!(dispatcher.stats().await.active_cooldowns, 0);
}
