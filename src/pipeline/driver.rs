use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::{Monitor, TickReport};

/// Published after every tick and every retention sweep.
#[derive(Debug, Clone)]
pub enum TickEvent {
    Tick(Arc<TickReport>),
    AlertsExpired { removed: usize },
}

/// Tracks when the retention sweep is next due.
pub struct RetentionClock {
    schedule: cron::Schedule,
    next_due: Option<DateTime<Utc>>,
}

impl RetentionClock {
    pub fn new(schedule: cron::Schedule, now: DateTime<Utc>) -> Self {
        let next_due = schedule.after(&now).next();
        Self { schedule, next_due }
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.next_due
    }

    /// True once per schedule slot reached by `now`; advances to the slot
    /// after `now`.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        match self.next_due {
            Some(due) if due <= now => {
                self.next_due = self.schedule.after(&now).next();
                true
            }
            _ => false,
        }
    }
}

/// Main tick loop. The first tick runs immediately, the next one starts only
/// after the previous returned. Runs until the task is dropped.
pub async fn run_tick_loop(
    monitor: Arc<Monitor>,
    period: Duration,
    retention: cron::Schedule,
    events: broadcast::Sender<TickEvent>,
) {
    info!(period_secs = period.as_secs(), "Tick loop started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut clock = RetentionClock::new(retention, Utc::now());

    loop {
        interval.tick().await;

        let report = Arc::new(monitor.generate_tick());
        monitor.dispatch_critical(&report);

        publish(&events, TickEvent::Tick(Arc::clone(&report)));

        if clock.poll(Utc::now()) {
            let removed = monitor.clean_old_alerts();
            info!(
                removed,
                next_due = ?clock.next_due(),
                "Alert retention sweep"
            );
            publish(&events, TickEvent::AlertsExpired { removed });
        }
    }
}

/// Send `event` to current subscribers. No subscribers is fine.
fn publish(events: &broadcast::Sender<TickEvent>, event: TickEvent) {
    if events.send(event).is_err() {
        debug!("No tick subscribers");
    }
}
