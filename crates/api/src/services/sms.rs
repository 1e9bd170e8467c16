//! SMS notification channel.
//!
//! `console` logs messages; `http` posts them to a generic SMS gateway as
//! `{"to", "from", "message"}` with a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use domain::models::{AlertNotification, ChannelKind, NotificationTarget};
use domain::services::{NotificationChannel, NotificationResult};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::alert_summary;
use crate::config::SmsConfig;

const SMS_TIMEOUT_SECS: u64 = 10;

/// Longest message sent in a single SMS segment.
pub const MAX_SMS_LENGTH: usize = 160;

#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    to: &'a str,
    from: &'a str,
    message: &'a str,
}

/// Sends alert text messages.
pub struct SmsChannel {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsChannel {
    pub fn new(config: SmsConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SMS_TIMEOUT_SECS))
            .build()?;
        Ok(Self { config, client })
    }

    async fn send_http(&self, to: &str, message: &str) -> Result<(), String> {
        let response = self
            .client
            .post(&self.config.gateway_url)
            .bearer_auth(&self.config.api_key)
            .json(&GatewayRequest {
                to,
                from: &self.config.sender_id,
                message,
            })
            .send()
            .await
            .map_err(|e| format!("SMS gateway request failed: {}", e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("SMS gateway returned {}", status))
        }
    }
}

/// Truncates the alert text to a single SMS segment.
pub fn sms_text(notification: &AlertNotification) -> String {
    let text = alert_summary(notification);
    if text.chars().count() <= MAX_SMS_LENGTH {
        return text;
    }
    let mut truncated: String = text.chars().take(MAX_SMS_LENGTH - 3).collect();
    truncated.push_str("...");
    truncated
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn deliver(
        &self,
        target: &NotificationTarget,
        notification: &AlertNotification,
    ) -> NotificationResult {
        let NotificationTarget::Sms { phone_number } = target else {
            return NotificationResult::Skipped;
        };
        if !self.config.enabled {
            return NotificationResult::Skipped;
        }

        let text = sms_text(notification);
        match self.config.provider.as_str() {
            "console" => {
                info!(to = %target.describe(), message = %text, "SMS (console provider)");
                NotificationResult::Sent
            }
            "http" => match self.send_http(phone_number, &text).await {
                Ok(()) => {
                    debug!(to = %target.describe(), "SMS sent via gateway");
                    NotificationResult::Sent
                }
                Err(e) => {
                    warn!(to = %target.describe(), error = %e, "SMS delivery failed");
                    NotificationResult::Failed(e)
                }
            },
            provider => NotificationResult::Failed(format!("Unknown SMS provider: {}", provider)),
        }
    }
}
