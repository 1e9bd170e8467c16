//! Webhook notification channel.
//!
//! Posts the alert payload as JSON, signed with HMAC-SHA256 when the target
//! carries a secret, and protects failing endpoints with an in-memory
//! circuit breaker keyed by URL.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use domain::models::{AlertNotification, ChannelKind, NotificationTarget};
use domain::services::{NotificationChannel, NotificationResult};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::WebhookConfig;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Header carrying the event type (`geofence_enter` / `geofence_exit`).
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// Errors that can occur during webhook delivery.
#[derive(Error, Debug)]
pub enum WebhookDeliveryError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HMAC signing error: {0}")]
    SigningError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Default, Clone, Copy)]
struct CircuitState {
    consecutive_failures: u32,
    open_until: Option<DateTime<Utc>>,
}

/// Delivers alerts to HTTP endpoints.
pub struct WebhookChannel {
    client: Client,
    config: WebhookConfig,
    circuits: Mutex<HashMap<String, CircuitState>>,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            circuits: Mutex::new(HashMap::new()),
        })
    }

    /// True while the breaker for `url` is open.
    pub fn is_circuit_open(&self, url: &str, now: DateTime<Utc>) -> bool {
        let circuits = self
            .circuits
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        circuits
            .get(url)
            .and_then(|state| state.open_until)
            .is_some_and(|until| until > now)
    }

    /// Counts a failure and opens the breaker once the threshold is reached.
    /// Returns the consecutive failure count.
    pub fn record_failure(&self, url: &str, now: DateTime<Utc>) -> u32 {
        let mut circuits = self
            .circuits
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = circuits.entry(url.to_string()).or_default();
        state.consecutive_failures += 1;

        if state.consecutive_failures >= self.config.circuit_breaker_threshold {
            let cooldown = ChronoDuration::seconds(
                self.config.circuit_breaker_cooldown_secs.min(i64::MAX as u64) as i64,
            );
            let open_until = now + cooldown;
            state.open_until = Some(open_until);
            warn!(
                target_url = %url,
                failure_count = state.consecutive_failures,
                open_until = %open_until,
                "Circuit breaker opened due to consecutive failures"
            );
        }
        state.consecutive_failures
    }

    /// Closes the breaker after a successful delivery.
    pub fn record_success(&self, url: &str) {
        let mut circuits = self
            .circuits
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        circuits.remove(url);
    }

    async fn post(
        &self,
        url: &str,
        payload: &str,
        event_type: &str,
        signature: Option<String>,
    ) -> Result<u16, WebhookDeliveryError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header(EVENT_HEADER, event_type)
            .body(payload.to_string());
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request.send().await?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn deliver(
        &self,
        target: &NotificationTarget,
        notification: &AlertNotification,
    ) -> NotificationResult {
        let NotificationTarget::Webhook { url, secret } = target else {
            return NotificationResult::Skipped;
        };

        if self.is_circuit_open(url, Utc::now()) {
            debug!(target_url = %url, "Skipping delivery - circuit breaker is open");
            return NotificationResult::Failed("circuit breaker open".to_string());
        }

        let payload = match serde_json::to_string(notification) {
            Ok(payload) => payload,
            Err(e) => return NotificationResult::Failed(e.to_string()),
        };
        let signature = match secret {
            Some(secret) => match sign_payload(&payload, secret) {
                Ok(signature) => Some(signature),
                Err(e) => return NotificationResult::Failed(e.to_string()),
            },
            None => None,
        };

        match self
            .post(url, &payload, &notification.event_type, signature)
            .await
        {
            Ok(status_code) if (200..300).contains(&status_code) => {
                info!(
                    event_id = %notification.event_id,
                    target_url = %url,
                    status_code = status_code,
                    "Webhook delivered successfully"
                );
                self.record_success(url);
                NotificationResult::Sent
            }
            Ok(status_code) => {
                warn!(
                    event_id = %notification.event_id,
                    target_url = %url,
                    status_code = status_code,
                    "Webhook delivery returned non-2xx status"
                );
                self.record_failure(url, Utc::now());
                NotificationResult::Failed(format!("HTTP {}", status_code))
            }
            Err(e) => {
                warn!(
                    event_id = %notification.event_id,
                    target_url = %url,
                    error = %e,
                    "Webhook delivery failed"
                );
                self.record_failure(url, Utc::now());
                NotificationResult::Failed(e.to_string())
            }
        }
    }
}

/// Signs the payload with HMAC-SHA256, formatted as `sha256=<hex>`.
pub fn sign_payload(payload: &str, secret: &str) -> Result<String, WebhookDeliveryError> {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookDeliveryError::SigningError(e.to_string()))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("sha256={}", signature))
}
