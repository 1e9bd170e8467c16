//! Notification channel abstraction.
//!
//! The alert dispatcher delivers each alert to a zone's targets through one
//! channel per [`ChannelKind`]. Concrete channels (webhook, email, SMS) live
//! in the API crate; this module defines the seam and a mock for tests.

use std::sync::{Arc, Mutex, PoisonError};

use crate::models::{AlertNotification, ChannelKind, NotificationTarget};

/// Result of a notification send attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationResult {
    /// Notification was delivered.
    Sent,
    /// Delivery failed; the dispatcher may retry.
    Failed(String),
    /// Nothing to do for this target (e.g. channel disabled).
    Skipped,
}

/// A delivery channel for alert notifications.
#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    /// The channel family this implementation serves.
    fn kind(&self) -> ChannelKind;

    /// Attempt one delivery of `notification` to `target`.
    async fn deliver(
        &self,
        target: &NotificationTarget,
        notification: &AlertNotification,
    ) -> NotificationResult;
}

/// A delivery recorded by [`MockNotificationChannel`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDelivery {
    pub target: NotificationTarget,
    pub notification: AlertNotification,
}

#[derive(Debug, Default)]
struct MockState {
    deliveries: Vec<RecordedDelivery>,
    attempts: usize,
    failures_remaining: usize,
}

/// Mock notification channel for development and testing.
///
/// Records deliveries instead of sending them and can be told to fail a
/// number of attempts first.
#[derive(Debug, Clone)]
pub struct MockNotificationChannel {
    kind: ChannelKind,
    /// Whether every attempt fails.
    pub simulate_failure: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockNotificationChannel {
    /// Create a new mock channel.
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            simulate_failure: false,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Create a mock channel whose every attempt fails.
    pub fn failing(kind: ChannelKind) -> Self {
        Self {
            simulate_failure: true,
            ..Self::new(kind)
        }
    }

    /// Create a mock channel that fails the first `count` attempts.
    pub fn failing_times(kind: ChannelKind, count: usize) -> Self {
        let channel = Self::new(kind);
        channel.lock().failures_remaining = count;
        channel
    }

    /// Successful deliveries so far.
    pub fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.lock().deliveries.clone()
    }

    /// Attempts so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl NotificationChannel for MockNotificationChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn deliver(
        &self,
        target: &NotificationTarget,
        notification: &AlertNotification,
    ) -> NotificationResult {
        let mut state = self.lock();
        state.attempts += 1;

        if self.simulate_failure || state.failures_remaining > 0 {
            state.failures_remaining = state.failures_remaining.saturating_sub(1);
            tracing::warn!(
                channel = %self.kind,
                target = %target.describe(),
                event_id = %notification.event_id,
                "Mock notification channel simulating failure"
            );
            return NotificationResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(
            channel = %self.kind,
            target = %target.describe(),
            event_type = %notification.event_type,
            geofence_id = %notification.geofence_id,
            "Mock: Would send alert notification"
        );
        state.deliveries.push(RecordedDelivery {
            target: target.clone(),
            notification: notification.clone(),
        });

        NotificationResult::Sent
    }
}
