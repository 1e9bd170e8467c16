//! Notification channel implementations and dispatcher wiring.

pub mod email;
pub mod sms;
pub mod webhook_delivery;

use std::sync::Arc;

use domain::models::AlertNotification;
use domain::services::{AlertDispatcher, NotificationChannel};
use tracing::info;

pub use email::EmailChannel;
pub use sms::SmsChannel;
pub use webhook_delivery::WebhookChannel;

use crate::config::Config;

/// One-line human readable description of an alert.
pub(crate) fn alert_summary(notification: &AlertNotification) -> String {
    let verb = if notification.event_type == "geofence_exit" {
        "left"
    } else {
        "entered"
    };
    format!(
        "Device {} {} \"{}\" at {:.5}, {:.5}",
        notification.device_id,
        verb,
        notification.geofence_name,
        notification.location.latitude,
        notification.location.longitude
    )
}

/// Builds the channels enabled in configuration.
pub fn build_channels(config: &Config) -> Result<Vec<Arc<dyn NotificationChannel>>, reqwest::Error> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if config.webhook.enabled {
        channels.push(Arc::new(WebhookChannel::new(config.webhook.clone())?));
    }
    if config.email.enabled {
        channels.push(Arc::new(EmailChannel::new(config.email.clone())?));
    }
    if config.sms.enabled {
        channels.push(Arc::new(SmsChannel::new(config.sms.clone())?));
    }

    info!(
        webhook = config.webhook.enabled,
        email = config.email.enabled,
        sms = config.sms.enabled,
        "Notification channels configured"
    );
    Ok(channels)
}

/// Creates the alert dispatcher with every configured channel attached.
pub fn build_dispatcher(config: &Config) -> Result<AlertDispatcher, reqwest::Error> {
    let dispatcher = build_channels(config)?
        .into_iter()
        .fold(AlertDispatcher::new(config.dispatcher.clone()), |d, channel| {
            d.with_channel(channel)
        });
    Ok(dispatcher)
}
