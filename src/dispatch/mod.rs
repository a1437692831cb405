//! Outbound alert notifications.
//!
//! The pipeline only sees the [`Notifier`] trait. [`Dispatcher`] is the
//! production implementation: a [`DeliveryGate`] decides whether an alert may
//! go out, and a [`Transport`] delivers it.

pub mod gate;

pub use self::gate::{DeliveryGate, GateDenial, Reservation};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{NotificationConfig, Recipients};
use crate::detect::{Alert, AlertKind, Severity};

pub const REASON_DISABLED: &str = "notifications disabled";
pub const REASON_RATE_LIMITED: &str = "rate limit exceeded";
pub const REASON_COOLDOWN: &str = "cooldown active";
pub const REASON_NO_RECIPIENTS: &str = "no recipients configured";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned status {0}")]
    Status(u16),
}

/// Result of one notification attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotifyOutcome {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub recipients: usize,
}

impl NotifyOutcome {
    pub fn sent(recipients: usize) -> Self {
        Self {
            sent: true,
            reason: None,
            recipients,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            sent: false,
            reason: Some(reason.into()),
            recipients: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub admin: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchStats {
    pub enabled: bool,
    pub transport: &'static str,
    pub sent_last_minute: usize,
    pub max_per_minute: u32,
    pub can_send_more: bool,
    pub active_cooldowns: usize,
    pub recipients: RecipientCounts,
}

/// Boundary the pipeline notifies through.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> NotifyOutcome;

    async fn clear_cooldowns(&self);

    async fn clear_rate_limiting(&self);

    async fn stats(&self) -> DispatchStats;
}

/// Delivers an alert that already passed the gate.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, alert: &Alert, recipients: &[String]) -> Result<(), DispatchError>;
}

/// Writes notifications to the tracing log only.
pub struct LogTransport;

#[async_trait::async_trait]
impl Transport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, alert: &Alert, recipients: &[String]) -> Result<(), DispatchError> {
        info!(
            floor_id = alert.floor_id,
            severity = %alert.severity,
            recipients = recipients.len(),
            summary = %render_summary(alert),
            "Alert notification"
        );
        Ok(())
    }
}

/// POSTs the alert as JSON.
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    alert: &'a Alert,
    recipients: &'a [String],
    summary: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(DispatchError::Client)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl Transport for WebhookTransport {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, alert: &Alert, recipients: &[String]) -> Result<(), DispatchError> {
        let payload = WebhookPayload {
            alert,
            recipients,
            summary: render_summary(alert),
        };
        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Gate plus transport.
pub struct Dispatcher {
    enabled: bool,
    recipients: Recipients,
    gate: DeliveryGate,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(config: &NotificationConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            enabled: config.enabled,
            recipients: config.recipients.clone(),
            gate: DeliveryGate::new(
                config.max_per_minute,
                Duration::from_secs(config.cooldown_minutes.saturating_mul(60)),
            ),
            transport,
        }
    }

    /// Webhook transport when a URL is configured, the log otherwise.
    pub fn from_config(config: &NotificationConfig) -> Result<Self, DispatchError> {
        let transport: Arc<dyn Transport> = match &config.webhook_url {
            Some(url) => Arc::new(WebhookTransport::new(url.clone())?),
            None => Arc::new(LogTransport),
        };
        Ok(Self::new(config, transport))
    }
}

#[async_trait::async_trait]
impl Notifier for Dispatcher {
    async fn notify(&self, alert: &Alert) -> NotifyOutcome {
        if !self.enabled {
            return NotifyOutcome::skipped(REASON_DISABLED);
        }

        let slot = match self.gate.try_acquire(alert.floor_id, alert.severity).await {
            Ok(slot) => slot,
            Err(GateDenial::RateLimited) => return NotifyOutcome::skipped(REASON_RATE_LIMITED),
            Err(GateDenial::CoolingDown { .. }) => return NotifyOutcome::skipped(REASON_COOLDOWN),
        };

        let recipients = recipients_for(&self.recipients, alert.severity);
        if recipients.is_empty() {
            self.gate.release(slot).await;
            return NotifyOutcome::skipped(REASON_NO_RECIPIENTS);
        }

        match self.transport.deliver(alert, &recipients).await {
            Ok(()) => {
                info!(
                    floor_id = alert.floor_id,
                    severity = %alert.severity,
                    recipients = recipients.len(),
                    transport = self.transport.name(),
                    "Notification sent"
                );
                NotifyOutcome::sent(recipients.len())
            }
            Err(e) => {
                self.gate.release(slot).await;
                warn!(
                    floor_id = alert.floor_id,
                    transport = self.transport.name(),
                    error = %e,
                    "Notification delivery failed"
                );
                NotifyOutcome::skipped(e.to_string())
            }
        }
    }

    async fn clear_cooldowns(&self) {
        self.gate.clear_cooldowns().await;
        info!("Notification cooldowns cleared");
    }

    async fn clear_rate_limiting(&self) {
        self.gate.clear_rate_limiting().await;
        info!("Notification rate limit window cleared");
    }

    async fn stats(&self) -> DispatchStats {
        let sent_last_minute = self.gate.sent_last_minute().await;
        let max_per_minute = self.gate.max_per_minute();
        DispatchStats {
            enabled: self.enabled,
            transport: self.transport.name(),
            sent_last_minute,
            max_per_minute,
            can_send_more: self.enabled && (sent_last_minute as u32) < max_per_minute,
            active_cooldowns: self.gate.active_cooldowns().await,
            recipients: RecipientCounts {
                critical: self.recipients.critical.len(),
                warning: self.recipients.warning.len(),
                info: self.recipients.info.len(),
                admin: self.recipients.admin.len(),
            },
        }
    }
}

/// Critical and warning alerts copy the admins; duplicates are dropped and
/// first-seen order is kept.
pub fn recipients_for(recipients: &Recipients, severity: Severity) -> Vec<String> {
    let lists: [&[String]; 2] = match severity {
        Severity::Critical => [
            recipients.critical.as_slice(),
            recipients.admin.as_slice(),
        ],
        Severity::Warning => [recipients.warning.as_slice(), recipients.admin.as_slice()],
        Severity::Info => [recipients.info.as_slice(), &[]],
    };

    let mut out: Vec<String> = Vec::new();
    for address in lists.into_iter().flatten() {
        if !out.contains(address) {
            out.push(address.clone());
        }
    }
    out
}

/// Plain-text body for an alert.
pub fn render_summary(alert: &Alert) -> String {
    let mut text = format!(
        "[{}] {} ({} alert, {} anomalies) at {}",
        alert.severity.to_string().to_uppercase(),
        alert.floor_name,
        match alert.kind {
            AlertKind::Observed => "observed",
            AlertKind::Predictive => "predictive",
        },
        alert.anomalies.len(),
        alert.timestamp.to_rfc3339(),
    );
    for anomaly in &alert.anomalies {
        text.push_str(&format!(
            "\n- {} [{}]: {}\n  -> {}",
            anomaly.metric, anomaly.severity, anomaly.message, anomaly.recommendation
        ));
    }
    text
}
