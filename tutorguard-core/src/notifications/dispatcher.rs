//! Notification dispatcher
//!
//! The request path pushes onto a [`NotificationQueue`]; a spawned
//! [`NotificationDispatcher`] drains it, delivering up to `max_in_flight`
//! notifications at once. Each one retries with exponential backoff on its
//! own task and the outcome is recorded in the store.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::{FamilyNotification, NotificationConfig, NotificationSink, RetryPolicy};
use crate::error::NotificationError;
use crate::store::SessionStore;

/// Sending half used by the engine
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<FamilyNotification>,
    config: NotificationConfig,
    deferred: Arc<Semaphore>,
}

impl NotificationQueue {
    /// Enqueue a notification without waiting for delivery
    ///
    /// Notifications of disabled types are dropped. A full queue parks the
    /// notification on a background send, up to `max_deferred` of them;
    /// past that it is dropped and [`NotificationError::QueueFull`] returned.
    pub fn enqueue(&self, notification: FamilyNotification) -> Result<(), NotificationError> {
        if !self.config.allows(notification.event_type) {
            debug!(event_type = ?notification.event_type, "Notification type disabled, skipping");
            return Ok(());
        }

        match self.tx.try_send(notification) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(notification)) => {
                let Ok(permit) = self.deferred.clone().try_acquire_owned() else {
                    error!(
                        notification_id = %notification.id,
                        family_id = %notification.family_id,
                        event_type = ?notification.event_type,
                        "Notification queue full, dropping notification"
                    );
                    return Err(NotificationError::QueueFull);
                };
                warn!(
                    notification_id = %notification.id,
                    "Notification queue full, deferring"
                );
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    if tx.send(notification).await.is_err() {
                        warn!("Notification queue closed before deferred send");
                    }
                    drop(permit);
                });
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NotificationError::QueueClosed),
        }
    }
}

/// Delivers queued notifications with bounded retry
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn SessionStore>,
    policy: RetryPolicy,
    max_in_flight: usize,
}

impl NotificationDispatcher {
    pub fn new(
        config: &NotificationConfig,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            sink,
            store,
            policy: RetryPolicy::from_config(config),
            max_in_flight: config.max_in_flight.max(1),
        }
    }

    /// Start a dispatcher task and return its queue
    ///
    /// The task ends once every queue clone has been dropped and the
    /// backlog is drained.
    pub fn spawn(
        config: &NotificationConfig,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn SessionStore>,
    ) -> (NotificationQueue, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let dispatcher = Self::new(config, sink, store);
        let handle = tokio::spawn(dispatcher.run(rx));
        let queue = NotificationQueue {
            tx,
            config: config.clone(),
            deferred: Arc::new(Semaphore::new(config.max_deferred)),
        };
        (queue, handle)
    }

    /// Drain the queue until it closes, then wait for in-flight deliveries
    pub async fn run(self, mut rx: mpsc::Receiver<FamilyNotification>) {
        info!(
            sink = self.sink.name(),
            max_in_flight = self.max_in_flight,
            "NotificationDispatcher started"
        );

        let slots = Arc::new(Semaphore::new(self.max_in_flight));
        let dispatcher = Arc::new(self);
        let mut in_flight = JoinSet::new();

        while let Some(notification) = rx.recv().await {
            // Reap finished deliveries so the set stays bounded
            while in_flight.try_join_next().is_some() {}

            let Ok(permit) = slots.clone().acquire_owned().await else {
                break;
            };
            let dispatcher = dispatcher.clone();
            in_flight.spawn(async move {
                dispatcher.dispatch(notification).await;
                drop(permit);
            });
        }

        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                error!("Notification delivery task failed: {}", e);
            }
        }

        info!("Notification queue closed, stopping NotificationDispatcher");
    }

    /// Deliver one notification, retrying until the attempt budget is spent
    pub async fn dispatch(&self, mut notification: FamilyNotification) {
        self.record(&notification).await;

        loop {
            notification.attempts += 1;
            match self.sink.deliver(&notification).await {
                Ok(()) => {
                    notification.delivered = true;
                    notification.delivered_at = Some(Utc::now());
                    notification.last_error = None;
                    debug!(
                        notification_id = %notification.id,
                        attempts = notification.attempts,
                        "Notification delivered"
                    );
                    break;
                }
                Err(e) => {
                    notification.last_error = Some(e.to_string());
                    match self.policy.next_delay(notification.attempts) {
                        Some(delay) => {
                            warn!(
                                notification_id = %notification.id,
                                attempt = notification.attempts,
                                retry_in_ms = delay.as_millis() as u64,
                                "Notification delivery failed: {}",
                                e
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            error!(
                                notification_id = %notification.id,
                                family_id = %notification.family_id,
                                event_type = ?notification.event_type,
                                attempts = notification.attempts,
                                "Notification permanently failed: {}",
                                e
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.record(&notification).await;
    }

    async fn record(&self, notification: &FamilyNotification) {
        if let Err(e) = self.store.upsert_notification(notification).await {
            error!(notification_id = %notification.id, "Failed to record notification: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::SessionDefaults;
    use crate::notifications::{NotificationEventType, RecordingSink};
    use crate::session::{LearningSession, StartSession};
    use crate::store::MemoryStore;
    use crate::types::FamilyId;

    fn fast_config() -> NotificationConfig {
        NotificationConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..Default::default()
        }
    }

    fn notification() -> FamilyNotification {
        let session = LearningSession::new(
            &StartSession::new("kid", "fam"),
            &SessionDefaults::default(),
            Utc::now(),
        );
        FamilyNotification::session_created(&session)
    }

    // ==================== Delivery Tests ====================

    #[tokio::test]
    async fn delivers_and_records() {
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(MemoryStore::new());
        let (queue, handle) = NotificationDispatcher::spawn(&fast_config(), sink.clone(), store.clone());

        queue.enqueue(notification()).unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(sink.delivered().await.len(), 1);
        let stored = store.notifications_for(&FamilyId::new("fam")).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].delivered);
        assert_eq!(stored[0].attempts, 1);
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let sink = Arc::new(RecordingSink::failing_first(2));
        let store = Arc::new(MemoryStore::new());
        let dispatcher = NotificationDispatcher::new(&fast_config(), sink.clone(), store.clone());

        dispatcher.dispatch(notification()).await;

        let stored = store.notifications_for(&FamilyId::new("fam")).await.unwrap();
        assert!(stored[0].delivered);
        assert_eq!(stored[0].attempts, 3);
        assert_eq!(sink.attempts(), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_recorded_not_raised() {
        let sink = Arc::new(RecordingSink::always_failing());
        let store = Arc::new(MemoryStore::new());
        let dispatcher = NotificationDispatcher::new(&fast_config(), sink.clone(), store.clone());

        dispatcher.dispatch(notification()).await;

        let stored = store.notifications_for(&FamilyId::new("fam")).await.unwrap();
        assert!(!stored[0].delivered);
        assert_eq!(stored[0].attempts, 3);
        assert!(stored[0].last_error.is_some());
        assert_eq!(sink.attempts(), 3);
    }

    #[tokio::test]
    async fn failing_family_does_not_hold_up_others() {
        let sink = Arc::new(RecordingSink::failing_for("stuck"));
        let store = Arc::new(MemoryStore::new());
        let config = NotificationConfig {
            initial_backoff_ms: 200,
            max_backoff_ms: 200,
            ..Default::default()
        };
        let (queue, handle) = NotificationDispatcher::spawn(&config, sink.clone(), store.clone());

        let session = LearningSession::new(
            &StartSession::new("kid", "stuck"),
            &SessionDefaults::default(),
            Utc::now(),
        );
        queue.enqueue(FamilyNotification::session_created(&session)).unwrap();
        queue.enqueue(notification()).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let delivered = sink.delivered().await;
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].family_id, FamilyId::new("fam"));

        drop(queue);
        handle.await.unwrap();
        let stuck = store.notifications_for(&FamilyId::new("stuck")).await.unwrap();
        assert!(!stuck[0].delivered);
        assert_eq!(stuck[0].attempts, 3);
    }

    // ==================== Queue Tests ====================

    #[tokio::test]
    async fn disabled_types_are_skipped() {
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(MemoryStore::new());
        let config = NotificationConfig {
            notify_session_created: false,
            ..fast_config()
        };
        let (queue, handle) = NotificationDispatcher::spawn(&config, sink.clone(), store);

        let n = notification();
        assert_eq!(n.event_type, NotificationEventType::SessionCreated);
        queue.enqueue(n).unwrap();
        drop(queue);
        handle.await.unwrap();

        assert!(sink.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn closed_queue_reports_error() {
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(MemoryStore::new());
        let (queue, handle) = NotificationDispatcher::spawn(&fast_config(), sink, store);
        handle.abort();
        let _ = handle.await;

        let err = queue.enqueue(notification()).unwrap_err();
        assert_eq!(err, NotificationError::QueueClosed);
    }

    #[tokio::test]
    async fn overflow_beyond_deferral_limit_is_dropped() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = NotificationQueue {
            tx,
            config: fast_config(),
            deferred: Arc::new(Semaphore::new(1)),
        };

        queue.enqueue(notification()).unwrap();
        queue.enqueue(notification()).unwrap();
        let err = queue.enqueue(notification()).unwrap_err();
        assert_eq!(err, NotificationError::QueueFull);
    }
}
