//! Alert dispatcher.
//!
//! Fans each alert out to the notification targets of its zone without
//! blocking evaluation. Re-deliveries of the same transition are suppressed
//! by a dedup key, and every target is retried independently with
//! exponential backoff. Targets that exhaust their attempts are reported on
//! a failure stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::notification::{NotificationChannel, NotificationResult};
use crate::models::{
    AlertEvent, AlertNotification, ChannelKind, DedupKey, DeliveryFailure, Geofence,
    NotificationTarget,
};

/// Dispatcher settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// How long a delivered key suppresses duplicates.
    pub dedup_window_secs: u64,
    /// Width of the timestamp bucket in the dedup key.
    pub dedup_bucket_secs: u64,
    /// Attempts per target, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Capacity of the delivery failure stream.
    pub failure_buffer: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: 60,
            dedup_bucket_secs: 60,
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            failure_buffer: 1024,
        }
    }
}

impl DispatcherConfig {
    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_window_secs.min(u64::from(u32::MAX)) as i64)
    }

    pub fn dedup_bucket(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_bucket_secs.clamp(1, u64::from(u32::MAX)) as i64)
    }

    /// Delay before retry number `attempt` (1-based): doubling, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(32);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

/// What happened to a dispatched alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Deliveries were started for this many targets.
    Queued(usize),
    /// An alert with the same dedup key was dispatched within the window.
    Duplicate,
    /// The zone has no notification targets.
    NoTargets,
}

/// Routes alert events to notification channels.
pub struct AlertDispatcher {
    config: DispatcherConfig,
    channels: HashMap<ChannelKind, Arc<dyn NotificationChannel>>,
    recent: Mutex<HashMap<DedupKey, DateTime<Utc>>>,
    tracker: TaskTracker,
    failures_tx: mpsc::Sender<DeliveryFailure>,
    failures_rx: Mutex<Option<mpsc::Receiver<DeliveryFailure>>>,
}

impl AlertDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        let (failures_tx, failures_rx) = mpsc::channel(config.failure_buffer.max(1));
        Self {
            config,
            channels: HashMap::new(),
            recent: Mutex::new(HashMap::new()),
            tracker: TaskTracker::new(),
            failures_tx,
            failures_rx: Mutex::new(Some(failures_rx)),
        }
    }

    /// Registers the channel serving its kind, replacing any previous one.
    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.insert(channel.kind(), channel);
        self
    }

    pub fn has_channel(&self, kind: ChannelKind) -> bool {
        self.channels.contains_key(&kind)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Takes the delivery failure stream. Returns `None` after the first call.
    pub fn take_failures(&self) -> Option<mpsc::Receiver<DeliveryFailure>> {
        self.failures_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Starts delivery of `event` to every target of `geofence`.
    ///
    /// Must be called from within a tokio runtime. Never waits on delivery.
    pub fn dispatch(&self, event: AlertEvent, geofence: &Geofence) -> DispatchOutcome {
        if geofence.notifications.is_empty() {
            return DispatchOutcome::NoTargets;
        }

        let now = Utc::now();
        let key = event.dedup_key(self.config.dedup_bucket());
        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(seen) = recent.get(&key) {
                if now - *seen < self.config.dedup_window() {
                    debug!(
                        event_id = %event.event_id,
                        geofence_id = %event.geofence_id,
                        device_id = %event.device_id,
                        "Suppressed duplicate alert"
                    );
                    return DispatchOutcome::Duplicate;
                }
            }
            recent.insert(key, now);
        }

        let notification = Arc::new(AlertNotification::new(&event, &geofence.name));
        let mut queued = 0;

        for target in &geofence.notifications {
            let Some(channel) = self.channels.get(&target.kind()) else {
                warn!(
                    channel = %target.kind(),
                    geofence_id = %geofence.id,
                    "No notification channel configured"
                );
                self.report(DeliveryFailure {
                    event: event.clone(),
                    channel: target.kind(),
                    target: target.describe(),
                    attempts: 0,
                    last_error: "channel not configured".to_string(),
                });
                continue;
            };

            self.tracker.spawn(deliver_with_retry(
                Arc::clone(channel),
                target.clone(),
                Arc::clone(&notification),
                event.clone(),
                self.config.clone(),
                self.failures_tx.clone(),
            ));
            queued += 1;
        }

        info!(
            event_id = %event.event_id,
            transition = %event.transition,
            targets = queued,
            "Alert dispatched"
        );
        DispatchOutcome::Queued(queued)
    }

    /// Forgets dedup keys recorded longer ago than the window.
    pub fn prune_dedup(&self, now: DateTime<Utc>) -> usize {
        let window = self.config.dedup_window();
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        let before = recent.len();
        recent.retain(|_, seen| now - *seen < window);
        before - recent.len()
    }

    /// Deliveries still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for in-flight deliveries, including their retries.
    /// Returns false if `timeout` elapsed first.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            warn!(
                in_flight = self.tracker.len(),
                "Alert dispatcher shutdown timed out"
            );
        }
        drained
    }

    fn report(&self, failure: DeliveryFailure) {
        if let Err(e) = self.failures_tx.try_send(failure) {
            warn!(error = %e, "Dropping delivery failure report");
        }
    }
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&'static str> = self.channels.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("AlertDispatcher")
            .field("config", &self.config)
            .field("channels", &kinds)
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}

async fn deliver_with_retry(
    channel: Arc<dyn NotificationChannel>,
    target: NotificationTarget,
    notification: Arc<AlertNotification>,
    event: AlertEvent,
    config: DispatcherConfig,
    failures: mpsc::Sender<DeliveryFailure>,
) {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match channel.deliver(&target, &notification).await {
            NotificationResult::Sent => {
                debug!(
                    event_id = %event.event_id,
                    target = %target.describe(),
                    attempt = attempt,
                    "Notification delivered"
                );
                return;
            }
            NotificationResult::Skipped => return,
            NotificationResult::Failed(error) if attempt >= max_attempts => {
                warn!(
                    event_id = %event.event_id,
                    target = %target.describe(),
                    attempts = attempt,
                    error = %error,
                    "Notification delivery failed permanently"
                );
                let failure = DeliveryFailure {
                    event,
                    channel: channel.kind(),
                    target: target.describe(),
                    attempts: attempt,
                    last_error: error,
                };
                if let Err(e) = failures.try_send(failure) {
                    warn!(error = %e, "Dropping delivery failure report");
                }
                return;
            }
            NotificationResult::Failed(error) => {
                let delay = config.backoff_for(attempt);
                debug!(
                    event_id = %event.event_id,
                    target = %target.describe(),
                    attempt = attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %error,
                    "Notification delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, GeofenceShape, TransitionKind};
    use crate::services::notification::MockNotificationChannel;
    use uuid::Uuid;

    fn fast_config() -> DispatcherConfig {
        DispatcherConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            ..Default::default()
        }
    }

    fn zone(notifications: Vec<NotificationTarget>) -> Geofence {
        let now = Utc::now();
        Geofence {
            id: Uuid::new_v4(),
            name: "Depot".to_string(),
            shape: GeofenceShape::Circle {
                center: Coordinate::new(0.0, 0.0),
                radius_meters: 100.0,
            },
            parent_id: None,
            dwell_seconds: 0,
            active: true,
            notifications,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn email() -> NotificationTarget {
        NotificationTarget::Email {
            address: "ops@example.com".to_string(),
        }
    }

    fn webhook() -> NotificationTarget {
        NotificationTarget::Webhook {
            url: "https://example.com/hook".to_string(),
            secret: None,
        }
    }

    fn event_for(zone: &Geofence, device: Uuid) -> AlertEvent {
        AlertEvent::new(
            zone.id,
            device,
            TransitionKind::Entered,
            Utc::now(),
            Coordinate::new(0.0, 0.0),
        )
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = DispatcherConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_millis(500));
        assert_eq!(config.backoff_for(2), Duration::from_millis(1_000));
        assert_eq!(config.backoff_for(3), Duration::from_millis(2_000));
        assert_eq!(config.backoff_for(20), Duration::from_millis(30_000));
        assert_eq!(config.backoff_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn test_dispatch_fans_out_per_channel() {
        let mail = MockNotificationChannel::new(ChannelKind::Email);
        let hooks = MockNotificationChannel::new(ChannelKind::Webhook);
        let dispatcher = AlertDispatcher::new(fast_config())
            .with_channel(Arc::new(mail.clone()))
            .with_channel(Arc::new(hooks.clone()));

        let zone = zone(vec![email(), webhook()]);
        let outcome = dispatcher.dispatch(event_for(&zone, Uuid::new_v4()), &zone);
        assert_eq!(outcome, DispatchOutcome::Queued(2));

        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);
        assert_eq!(mail.deliveries().len(), 1);
        assert_eq!(hooks.deliveries().len(), 1);
        assert_eq!(hooks.deliveries()[0].notification.event_type, "geofence_enter");
    }

    #[tokio::test]
    async fn test_duplicate_alerts_suppressed() {
        let mail = MockNotificationChannel::new(ChannelKind::Email);
        let dispatcher = AlertDispatcher::new(fast_config()).with_channel(Arc::new(mail.clone()));

        let zone = zone(vec![email()]);
        let device = Uuid::new_v4();
        let first = event_for(&zone, device);
        let mut again = first.clone();
        again.event_id = Uuid::new_v4();

        assert_eq!(dispatcher.dispatch(first, &zone), DispatchOutcome::Queued(1));
        assert_eq!(dispatcher.dispatch(again, &zone), DispatchOutcome::Duplicate);

        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);
        assert_eq!(mail.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn test_no_targets() {
        let dispatcher = AlertDispatcher::new(fast_config());
        let zone = zone(vec![]);
        assert_eq!(
            dispatcher.dispatch(event_for(&zone, Uuid::new_v4()), &zone),
            DispatchOutcome::NoTargets
        );
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let mail = MockNotificationChannel::failing_times(ChannelKind::Email, 2);
        let dispatcher = AlertDispatcher::new(fast_config()).with_channel(Arc::new(mail.clone()));
        let mut failures = dispatcher.take_failures().unwrap();

        let zone = zone(vec![email()]);
        dispatcher.dispatch(event_for(&zone, Uuid::new_v4()), &zone);
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        assert_eq!(mail.attempts(), 3);
        assert_eq!(mail.deliveries().len(), 1);
        assert!(failures.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_exhausted_retries_reported() {
        let mail = MockNotificationChannel::failing(ChannelKind::Email);
        let config = DispatcherConfig {
            max_attempts: 3,
            ..fast_config()
        };
        let dispatcher = AlertDispatcher::new(config).with_channel(Arc::new(mail.clone()));
        let mut failures = dispatcher.take_failures().unwrap();
        assert!(dispatcher.take_failures().is_none());

        let zone = zone(vec![email()]);
        let event = event_for(&zone, Uuid::new_v4());
        dispatcher.dispatch(event.clone(), &zone);
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.event.event_id, event.event_id);
        assert_eq!(failure.channel, ChannelKind::Email);
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.last_error, "Simulated failure");
        assert_eq!(mail.attempts(), 3);
    }

    #[tokio::test]
    async fn test_missing_channel_reported() {
        let dispatcher = AlertDispatcher::new(fast_config());
        let mut failures = dispatcher.take_failures().unwrap();

        let zone = zone(vec![NotificationTarget::Sms {
            phone_number: "+15551234567".to_string(),
        }]);
        assert_eq!(
            dispatcher.dispatch(event_for(&zone, Uuid::new_v4()), &zone),
            DispatchOutcome::Queued(0)
        );

        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.channel, ChannelKind::Sms);
        assert_eq!(failure.attempts, 0);
        assert_eq!(failure.target, "sms:***4567");
    }

    #[tokio::test]
    async fn test_prune_dedup() {
        let mail = MockNotificationChannel::new(ChannelKind::Email);
        let dispatcher = AlertDispatcher::new(fast_config()).with_channel(Arc::new(mail));

        let zone = zone(vec![email()]);
        dispatcher.dispatch(event_for(&zone, Uuid::new_v4()), &zone);
        dispatcher.dispatch(event_for(&zone, Uuid::new_v4()), &zone);

        assert_eq!(dispatcher.prune_dedup(Utc::now()), 0);
        assert_eq!(
            dispatcher.prune_dedup(Utc::now() + chrono::Duration::minutes(2)),
            2
        );
        dispatcher.shutdown(Duration::from_secs(5)).await;
    }
}
