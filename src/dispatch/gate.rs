//! Delivery gating for alert notifications.
//!
//! The [`DeliveryGate`] enforces a global sliding-window send budget and a
//! per-(floor, severity) cooldown. State sits behind a `tokio::sync::RwLock`
//! so the tick loop and API handlers can share one gate.
//!
//! A send slot is taken with [`DeliveryGate::try_acquire`], which checks and
//! reserves under one write guard. A delivery that fails hands its slot back
//! with [`DeliveryGate::release`].

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::detect::Severity;
use crate::telemetry::FloorId;

const WINDOW: Duration = Duration::from_secs(60);

/// Why the gate refused a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDenial {
    RateLimited,
    CoolingDown { remaining: Duration },
}

/// A send slot held between acquisition and delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    floor_id: FloorId,
    severity: Severity,
    at: Instant,
    /// Cooldown entry replaced by this reservation.
    previous: Option<Instant>,
}

struct GateInner {
    /// Send instants inside the last minute.
    sent: VecDeque<Instant>,
    /// Last send per floor and severity.
    last_sent: HashMap<(FloorId, Severity), Instant>,
}

pub struct DeliveryGate {
    inner: RwLock<GateInner>,
    max_per_minute: u32,
    cooldown: Duration,
}

impl DeliveryGate {
    pub fn new(max_per_minute: u32, cooldown: Duration) -> Self {
        Self {
            inner: RwLock::new(GateInner {
                sent: VecDeque::new(),
                last_sent: HashMap::new(),
            }),
            max_per_minute,
            cooldown,
        }
    }

    pub fn max_per_minute(&self) -> u32 {
        self.max_per_minute
    }

    /// Check the budget first, then the cooldown for `(floor_id, severity)`,
    /// and reserve the slot if both pass.
    pub async fn try_acquire(
        &self,
        floor_id: FloorId,
        severity: Severity,
    ) -> Result<Reservation, GateDenial> {
        self.try_acquire_at(floor_id, severity, Instant::now()).await
    }

    pub async fn try_acquire_at(
        &self,
        floor_id: FloorId,
        severity: Severity,
        now: Instant,
    ) -> Result<Reservation, GateDenial> {
        let mut inner = self.inner.write().await;
        while inner
            .sent
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= WINDOW)
        {
            inner.sent.pop_front();
        }

        let recent = recent_count(&inner.sent, now);
        if recent as u32 >= self.max_per_minute {
            debug!(
                recent,
                max = self.max_per_minute,
                "notification rate limit reached"
            );
            return Err(GateDenial::RateLimited);
        }

        let key = (floor_id, severity);
        let previous = inner.last_sent.get(&key).copied();
        if let Some(last) = previous {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                debug!(
                    floor_id,
                    severity = %severity,
                    remaining_secs = remaining.as_secs(),
                    "notification cooldown active"
                );
                return Err(GateDenial::CoolingDown { remaining });
            }
        }

        inner.sent.push_back(now);
        inner.last_sent.insert(key, now);
        Ok(Reservation {
            floor_id,
            severity,
            at: now,
            previous,
        })
    }

    /// Hand back a slot whose delivery failed. The budget entry is dropped
    /// and the cooldown reverts to what it was before the reservation,
    /// unless a later send already replaced it.
    pub async fn release(&self, reservation: Reservation) {
        let mut inner = self.inner.write().await;
        if let Some(pos) = inner.sent.iter().rposition(|&t| t == reservation.at) {
            inner.sent.remove(pos);
        }

        let key = (reservation.floor_id, reservation.severity);
        if inner.last_sent.get(&key) == Some(&reservation.at) {
            match reservation.previous {
                Some(previous) => {
                    inner.last_sent.insert(key, previous);
                }
                None => {
                    inner.last_sent.remove(&key);
                }
            }
        }
    }

    /// Sends counted against the current minute.
    pub async fn sent_last_minute(&self) -> usize {
        recent_count(&self.inner.read().await.sent, Instant::now())
    }

    /// Cooldown keys that still block a send.
    pub async fn active_cooldowns(&self) -> usize {
        let now = Instant::now();
        self.inner
            .read()
            .await
            .last_sent
            .values()
            .filter(|&&t| now.saturating_duration_since(t) < self.cooldown)
            .count()
    }

    pub async fn clear_cooldowns(&self) {
        self.inner.write().await.last_sent.clear();
    }

    pub async fn clear_rate_limiting(&self) {
        self.inner.write().await.sent.clear();
    }
}

fn recent_count(sent: &VecDeque<Instant>, now: Instant) -> usize {
    sent.iter()
        .filter(|&&t| now.saturating_duration_since(t) < WINDOW)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIFTEEN_MIN: Duration = Duration::from_secs(15 * 60);

    #[tokio::test]
    async fn test_rate_limit_allows_then_denies() {
        let gate = DeliveryGate::new(5, Duration::ZERO);
        let now = Instant::now();

        for floor in 1..=5 {
            assert!(gate.try_acquire_at(floor, Severity::Critical, now).await.is_ok());
        }
        assert_eq!(
            gate.try_acquire_at(6, Severity::Critical, now).await,
            Err(GateDenial::RateLimited)
        );

        // The window slides
        let later = now + Duration::from_secs(61);
        assert!(gate.try_acquire_at(6, Severity::Critical, later).await.is_ok());
    }

    #[tokio::test]
    async fn test_cooldown_per_floor_and_severity() {
        let gate = DeliveryGate::new(100, FIFTEEN_MIN);
        let now = Instant::now();
        gate.try_acquire_at(2, Severity::Critical, now).await.unwrap();

        let denied = gate
            .try_acquire_at(2, Severity::Critical, now + Duration::from_secs(60))
            .await;
        assert_eq!(
            denied,
            Err(GateDenial::CoolingDown {
                remaining: Duration::from_secs(14 * 60)
            })
        );

        // Other keys are independent
        assert!(gate.try_acquire_at(2, Severity::Warning, now).await.is_ok());
        assert!(gate.try_acquire_at(3, Severity::Critical, now).await.is_ok());

        assert!(gate
            .try_acquire_at(2, Severity::Critical, now + FIFTEEN_MIN)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_checked_before_cooldown() {
        let gate = DeliveryGate::new(1, FIFTEEN_MIN);
        let now = Instant::now();
        gate.try_acquire_at(1, Severity::Critical, now).await.unwrap();
        assert_eq!(
            gate.try_acquire_at(1, Severity::Critical, now).await,
            Err(GateDenial::RateLimited)
        );
    }

    #[tokio::test]
    async fn test_second_acquire_on_same_key_denied_before_delivery() {
        let gate = DeliveryGate::new(10, FIFTEEN_MIN);
        let now = Instant::now();
        let _held = gate.try_acquire_at(1, Severity::Critical, now).await.unwrap();
        assert!(matches!(
            gate.try_acquire_at(1, Severity::Critical, now).await,
            Err(GateDenial::CoolingDown { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_restores_budget_and_cooldown() {
        let gate = DeliveryGate::new(1, FIFTEEN_MIN);
        let slot = gate.try_acquire(3, Severity::Critical).await.unwrap();
        assert_eq!(gate.sent_last_minute().await, 1);
        assert_eq!(gate.active_cooldowns().await, 1);

        gate.release(slot).await;
        assert_eq!(gate.sent_last_minute().await, 0);
        assert_eq!(gate.active_cooldowns().await, 0);
        assert!(gate.try_acquire(3, Severity::Critical).await.is_ok());
    }

    #[tokio::test]
    async fn test_release_restores_previous_cooldown() {
        let gate = DeliveryGate::new(10, FIFTEEN_MIN);
        let start = Instant::now();
        gate.try_acquire_at(1, Severity::Critical, start).await.unwrap();

        let later = start + FIFTEEN_MIN;
        let retry = gate.try_acquire_at(1, Severity::Critical, later).await.unwrap();
        gate.release(retry).await;

        // The earlier send still anchors the cooldown
        assert_eq!(
            gate.try_acquire_at(1, Severity::Critical, start + Duration::from_secs(60))
                .await,
            Err(GateDenial::CoolingDown {
                remaining: Duration::from_secs(14 * 60)
            })
        );
    }

    #[tokio::test]
    async fn test_clearing_state() {
        let gate = DeliveryGate::new(1, FIFTEEN_MIN);
        gate.try_acquire(4, Severity::Critical).await.unwrap();
        assert_eq!(gate.sent_last_minute().await, 1);
        assert_eq!(gate.active_cooldowns().await, 1);

        gate.clear_rate_limiting().await;
        assert_eq!(gate.sent_last_minute().await, 0);
        assert!(matches!(
            gate.try_acquire(4, Severity::Critical).await,
            Err(GateDenial::CoolingDown { .. })
        ));

        gate.clear_cooldowns().await;
        assert_eq!(gate.active_cooldowns().await, 0);
        assert!(gate.try_acquire(4, Severity::Critical).await.is_ok());
    }
}
