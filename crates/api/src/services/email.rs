//! Email notification channel.
//!
//! Supports two providers:
//! - `console`: Logs alert emails (development)
//! - `sendgrid`: Uses the SendGrid API

use std::time::Duration;

use async_trait::async_trait;
use domain::models::{AlertNotification, ChannelKind, NotificationTarget};
use domain::services::{NotificationChannel, NotificationResult};
use thiserror::Error;
use tracing::{debug, error, info};

use super::alert_summary;
use crate::config::EmailConfig;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const EMAIL_TIMEOUT_SECS: u64 = 10;

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
}

impl EmailMessage {
    /// Renders the alert email for one recipient.
    pub fn for_alert(to: &str, notification: &AlertNotification) -> Self {
        let summary = alert_summary(notification);
        let body_text = format!(
            "{summary}\n\nEvent: {event_id}\nDevice: {device_id}\nZone: {geofence_id}\nTimestamp (ms): {timestamp}\n",
            summary = summary,
            event_id = notification.event_id,
            device_id = notification.device_id,
            geofence_id = notification.geofence_id,
            timestamp = notification.timestamp,
        );

        Self {
            to: to.to_string(),
            subject: format!("Geofence alert: {}", notification.geofence_name),
            body_text,
        }
    }
}

/// Sends alert emails through the configured provider.
pub struct EmailChannel {
    config: EmailConfig,
    client: reqwest::Client,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(EMAIL_TIMEOUT_SECS))
            .build()?;
        Ok(Self { config, client })
    }

    /// Send an email message.
    pub async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        match self.config.provider.as_str() {
            "console" => {
                info!(
                    to = %message.to,
                    subject = %message.subject,
                    body = %message.body_text,
                    "Email (console provider)"
                );
                Ok(())
            }
            "sendgrid" => self.send_sendgrid(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }

    async fn send_sendgrid(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let body = serde_json::json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": [{
                "type": "text/plain",
                "value": message.body_text
            }]
        });

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.sendgrid_api_key),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        if response.status().is_success() {
            debug!(to = %message.to, "Email sent via SendGrid");
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "SendGrid API error");
            Err(EmailError::ProviderError(format!(
                "SendGrid returned {}: {}",
                status, error_body
            )))
        }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn deliver(
        &self,
        target: &NotificationTarget,
        notification: &AlertNotification,
    ) -> NotificationResult {
        let NotificationTarget::Email { address } = target else {
            return NotificationResult::Skipped;
        };
        if !self.config.enabled {
            return NotificationResult::Skipped;
        }

        let message = EmailMessage::for_alert(address, notification);
        match self.send(&message).await {
            Ok(()) => NotificationResult::Sent,
            Err(e) => NotificationResult::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::{AlertEvent, Coordinate, TransitionKind};
    use uuid::Uuid;

    fn test_config(provider: &str) -> EmailConfig {
        EmailConfig {
            enabled: true,
            provider: provider.to_string(),
            sendgrid_api_key: String::new(),
            sender_email: "alerts@example.com".to_string(),
            sender_name: "Alerts".to_string(),
        }
    }

    fn notification(transition: TransitionKind) -> AlertNotification {
        let event = AlertEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            transition,
            Utc::now(),
            Coordinate::new(51.5, -0.12),
        );
        AlertNotification::new(&event, "Warehouse")
    }

    fn target() -> NotificationTarget {
        NotificationTarget::Email {
            address: "ops@example.com".to_string(),
        }
    }

    #[test]
    fn test_email_message_for_alert() {
        let n = notification(TransitionKind::Exited);
        let message = EmailMessage::for_alert("ops@example.com", &n);
        assert_eq!(message.subject, "Geofence alert: Warehouse");
        assert!(message.body_text.contains("left"));
        assert!(message.body_text.contains(&n.event_id.to_string()));
    }

    #[tokio::test]
    async fn test_console_provider_sends() {
        let channel = EmailChannel::new(test_config("console")).unwrap();
        let result = channel
            .deliver(&target(), &notification(TransitionKind::Entered))
            .await;
        assert_eq!(result, NotificationResult::Sent);
    }

    #[tokio::test]
    async fn test_disabled_channel_skips() {
        let mut config = test_config("console");
        config.enabled = false;
        let channel = EmailChannel::new(config).unwrap();
        let result = channel
            .deliver(&target(), &notification(TransitionKind::Entered))
            .await;
        assert_eq!(result, NotificationResult::Skipped);
    }

    #[tokio::test]
    async fn test_sendgrid_without_key_fails() {
        let channel = EmailChannel::new(test_config("sendgrid")).unwrap();
        let result = channel
            .deliver(&target(), &notification(TransitionKind::Entered))
            .await;
        assert!(matches!(result, NotificationResult::Failed(_)));
    }
}
