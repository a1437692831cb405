//! SmartFloors -- floor-level telemetry simulation with short-horizon
//! forecasting and observed plus preventive alerting.
//!
//! The core is synchronous and pure where it can be: the generator produces
//! readings, the forecaster projects them, the anomaly engine turns both into
//! alerts. The tick driver, HTTP surface and notification dispatch wrap it.

pub mod api;
pub mod config;
pub mod detect;
pub mod dispatch;
pub mod forecast;
pub mod pipeline;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::pipeline::{Monitor, TickReport};

/// Buffered tick events per subscriber.
const EVENT_CAPACITY: usize = 64;

/// Start the daemon: tick loop in the background, API server in front.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.api.socket_addr()?;
    let schedule = config.retention.schedule()?;
    let monitor = Arc::new(
        Monitor::from_config(&config).context("failed to build notification dispatcher")?,
    );

    tracing::info!(
        building = %config.building.name,
        floors = config.building.floors,
        interval_secs = config.simulation.interval_secs,
        "Starting monitor"
    );

    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    tokio::spawn(pipeline::run_tick_loop(
        Arc::clone(&monitor),
        Duration::from_secs(config.simulation.interval_secs),
        schedule,
        events,
    ));

    let app = api::router(api::state::AppState::new(monitor));

    tracing::info!(%addr, "SmartFloors listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run `ticks` back-to-back ticks in-process, waiting for every dispatch.
pub async fn simulate(config: &Config, ticks: u32) -> Result<Vec<TickReport>> {
    let monitor =
        Monitor::from_config(config).context("failed to build notification dispatcher")?;
    let mut reports = Vec::with_capacity(ticks as usize);
    for _ in 0..ticks {
        let report = monitor.generate_tick();
        for handle in monitor.dispatch_critical(&report) {
            handle.await.context("notification task failed")?;
        }
        reports.push(report);
    }
    Ok(reports)
}
