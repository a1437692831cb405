//! HTTP surface tests, driven in-process through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use smartfloors::api::{router, state::AppState};
use smartfloors::config::Config;
use smartfloors::pipeline::Monitor;

fn app_with_ticks(ticks: usize) -> axum::Router {
    let mut config = Config::default();
    config.building.floors = 3;
    config.simulation.seed = Some(17);
    let monitor = Arc::new(Monitor::from_config(&config).unwrap());
    for _ in 0..ticks {
        monitor.generate_tick();
    }
    router(AppState::new(monitor))
}

async fn call(app: axum::Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    call(app, Method::GET, uri).await
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(app_with_ticks(0), "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["floors"], 3);
    assert!(body["meta"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_floors_and_single_floor() {
    let app = app_with_ticks(1);
    let (status, body) = get(app.clone(), "/api/v1/floors").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 3);
    assert!(body["data"][0]["powerConsumption"].is_number());

    let (status, body) = get(app.clone(), "/api/v1/floors/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["floorId"], 2);
    assert_eq!(body["data"]["name"], "Floor 2");

    let (status, body) = get(app, "/api/v1/floors/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "floor 42 not found");
}

#[tokio::test]
async fn test_history_limit() {
    let app = app_with_ticks(12);
    let (_, body) = get(app.clone(), "/api/v1/floors/1/history").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 12);
    assert_eq!(body["meta"]["limit"], 60);

    let (_, body) = get(app, "/api/v1/floors/1/history?limit=5").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_predictions() {
    let app = app_with_ticks(10);
    let (status, body) = get(app.clone(), "/api/v1/floors/3/predictions?minutes_ahead=30").await;
    assert_eq!(status, StatusCode::OK);
    let temps = body["data"]["temperature"]["predictions"].as_array().unwrap();
    assert_eq!(temps.len(), 3);
    assert_eq!(temps[2]["minutesAhead"], 30);
    assert_eq!(body["data"]["humidity"]["method"], "hybrid");

    let (status, _) = get(app, "/api/v1/floors/9/predictions").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alert_filters() {
    let app = app_with_ticks(40);
    let (status, body) = get(app.clone(), "/api/v1/alerts?severity=critical&limit=4").await;
    assert_eq!(status, StatusCode::OK);
    let alerts = body["data"].as_array().unwrap();
    assert!(alerts.len() <= 4);
    assert!(alerts.iter().all(|a| a["severity"] == "critical"));

    let (_, body) = get(app.clone(), "/api/v1/alerts?floor_id=2").await;
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|a| a["floorId"] == 2));

    let (status, body) = get(app, "/api/v1/alerts?type=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("bogus"));
}

#[tokio::test]
async fn test_stats() {
    let (status, body) = get(app_with_ticks(1), "/api/v1/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalFloors"], 3);
    assert_eq!(body["data"]["buildingName"], "Main Building");
}

#[tokio::test]
async fn test_notification_endpoints() {
    let app = app_with_ticks(0);
    let (status, body) = get(app.clone(), "/api/v1/notifications/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled"], false);
    assert_eq!(body["data"]["maxPerMinute"], 5);
    assert_eq!(body["data"]["transport"], "log");

    let (status, _) = call(app.clone(), Method::POST, "/api/v1/notifications/cooldowns/clear").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(app, Method::POST, "/api/v1/notifications/rate-limit/clear").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, _) = get(app_with_ticks(0), "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_query_bounds_rejected() {
    let app = app_with_ticks(2);
    for uri in [
        "/api/v1/floors/1/predictions?minutes_ahead=9",
        "/api/v1/floors/1/predictions?minutes_ahead=181",
        "/api/v1/floors/1/predictions?minutes_ahead=4000000000",
        "/api/v1/floors/1/history?limit=0",
        "/api/v1/floors/1/history?limit=1441",
        "/api/v1/alerts?limit=0",
        "/api/v1/alerts?limit=101",
    ] {
        let (status, _) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
    }

    let (status, body) = get(app.clone(), "/api/v1/floors/1/predictions?minutes_ahead=181").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("minutes_ahead"));

    let (status, body) = get(app.clone(), "/api/v1/floors/1/predictions?minutes_ahead=180").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["occupancy"]["predictions"].as_array().unwrap().len(),
        18
    );
    let (status, _) = get(app, "/api/v1/floors/1/history?limit=1440").await;
    assert_eq!(status, StatusCode::OK);
}
