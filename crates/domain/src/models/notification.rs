//! Notification routing models.
//!
//! A geofence carries a list of [`NotificationTarget`]s; the alert dispatcher
//! delivers each alert to every target over the channel matching its kind.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{ValidateEmail, ValidateUrl};

use super::alert::AlertEvent;

/// Notification channel families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Sms,
    Webhook,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an alert for a zone should be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum NotificationTarget {
    Email {
        address: String,
    },
    Sms {
        phone_number: String,
    },
    Webhook {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret: Option<String>,
    },
}

impl NotificationTarget {
    pub fn kind(&self) -> ChannelKind {
        match self {
            NotificationTarget::Email { .. } => ChannelKind::Email,
            NotificationTarget::Sms { .. } => ChannelKind::Sms,
            NotificationTarget::Webhook { .. } => ChannelKind::Webhook,
        }
    }

    /// Checks the address format for the target's channel.
    pub fn check(&self) -> Result<(), String> {
        match self {
            NotificationTarget::Email { address } => {
                if address.validate_email() {
                    Ok(())
                } else {
                    Err(format!("Invalid email address: {}", address))
                }
            }
            NotificationTarget::Sms { phone_number } => {
                let digits = phone_number
                    .strip_prefix('+')
                    .unwrap_or(phone_number.as_str());
                if (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
                    Ok(())
                } else {
                    Err(format!("Invalid phone number: {}", phone_number))
                }
            }
            NotificationTarget::Webhook { url, .. } => {
                if url.validate_url() && (url.starts_with("https://") || url.starts_with("http://"))
                {
                    Ok(())
                } else {
                    Err(format!("Invalid webhook URL: {}", url))
                }
            }
        }
    }

    /// Log-safe description of the target (phone numbers masked, secrets omitted).
    pub fn describe(&self) -> String {
        match self {
            NotificationTarget::Email { address } => format!("email:{}", address),
            NotificationTarget::Sms { phone_number } => {
                let skip = phone_number.chars().count().saturating_sub(4);
                let tail: String = phone_number.chars().skip(skip).collect();
                format!("sms:***{}", tail)
            }
            NotificationTarget::Webhook { url, .. } => format!("webhook:{}", url),
        }
    }
}

/// Location data in a notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Payload handed to notification channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub event_type: String,
    pub event_id: Uuid,
    pub device_id: Uuid,
    pub geofence_id: Uuid,
    pub geofence_name: String,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    pub location: NotificationLocation,
}

impl AlertNotification {
    pub fn new(event: &AlertEvent, geofence_name: &str) -> Self {
        Self {
            event_type: event.transition.to_webhook_event_type().to_string(),
            event_id: event.event_id,
            device_id: event.device_id,
            geofence_id: event.geofence_id,
            geofence_name: geofence_name.to_string(),
            timestamp: event.timestamp.timestamp_millis(),
            location: NotificationLocation {
                latitude: event.location.latitude,
                longitude: event.location.longitude,
            },
        }
    }
}

/// Emitted when a target exhausted its delivery attempts.
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub event: AlertEvent,
    pub channel: ChannelKind,
    pub target: String,
    pub attempts: u32,
    pub last_error: String,
}
