//! Configuration for guardian notifications

use serde::{Deserialize, Serialize};

use super::NotificationEventType;

/// Configuration for guardian notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether notifications are enabled globally
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Notify when a session is started
    #[serde(default = "default_true")]
    pub notify_session_created: bool,

    /// Notify on every status transition
    #[serde(default = "default_true")]
    pub notify_status_changes: bool,

    /// Notify when a suspicion event is raised
    #[serde(default = "default_true")]
    pub notify_suspicion: bool,

    /// Notify with the result of guardian interventions
    #[serde(default = "default_true")]
    pub notify_interventions: bool,

    /// Delivery attempts before a notification is given up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles per attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Pending notifications buffered in the queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Sends parked while the queue is full; beyond this they are dropped
    #[serde(default = "default_max_deferred")]
    pub max_deferred: usize,

    /// Notifications delivered concurrently
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_deferred() -> usize {
    64
}

fn default_max_in_flight() -> usize {
    8
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            notify_session_created: true,
            notify_status_changes: true,
            notify_suspicion: true,
            notify_interventions: true,
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            queue_capacity: default_queue_capacity(),
            max_deferred: default_max_deferred(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl NotificationConfig {
    /// Create a config with all notifications disabled
    pub fn all_disabled() -> Self {
        Self {
            enabled: false,
            notify_session_created: false,
            notify_status_changes: false,
            notify_suspicion: false,
            notify_interventions: false,
            ..Self::default()
        }
    }

    /// Whether notifications of this type should be sent
    pub fn allows(&self, event_type: NotificationEventType) -> bool {
        self.enabled
            && match event_type {
                NotificationEventType::SessionCreated => self.notify_session_created,
                NotificationEventType::StatusChanged => self.notify_status_changes,
                NotificationEventType::SuspicionRaised => self.notify_suspicion,
                NotificationEventType::InterventionApplied => self.notify_interventions,
            }
    }
}
