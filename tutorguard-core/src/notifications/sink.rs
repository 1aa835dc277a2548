//! Notification transports

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use super::FamilyNotification;
use crate::error::NotificationError;
use crate::types::FamilyId;

/// Delivers a notification to a family's guardians
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &FamilyNotification) -> Result<(), NotificationError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Writes notifications to the log; for local runs
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn deliver(&self, notification: &FamilyNotification) -> Result<(), NotificationError> {
        info!(
            family_id = %notification.family_id,
            session_id = %notification.session_id,
            event_type = ?notification.event_type,
            payload = %notification.payload,
            "Family notification"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps delivered notifications in memory, optionally failing first
///
/// Useful in tests to observe what guardians would have received.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<FamilyNotification>>,
    failures_left: AtomicUsize,
    failing_family: Option<FamilyId>,
    attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` delivery attempts
    pub fn failing_first(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    /// Fail every delivery attempt
    pub fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    /// Fail every delivery to one family
    pub fn failing_for(family: impl Into<FamilyId>) -> Self {
        Self {
            failing_family: Some(family.into()),
            ..Self::default()
        }
    }

    pub async fn delivered(&self) -> Vec<FamilyNotification> {
        self.delivered.lock().await.clone()
    }

    /// Delivery attempts, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &FamilyNotification) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_family.as_ref() == Some(&notification.family_id)
            || self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if failing {
            return Err(NotificationError::DeliveryFailed(
                "transport unavailable".to_string(),
            ));
        }
        self.delivered.lock().await.push(notification.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
