//! Guardian notifications
//!
//! Session events are turned into [`FamilyNotification`]s, pushed onto a
//! [`NotificationQueue`] and delivered out of band by the
//! [`NotificationDispatcher`]. Delivery failures never reach the operation
//! that produced the notification.

mod backoff;
mod config;
mod dispatcher;
mod sink;
mod types;

pub use backoff::RetryPolicy;
pub use config::NotificationConfig;
pub use dispatcher::{NotificationDispatcher, NotificationQueue};
pub use sink::{LoggingSink, NotificationSink, RecordingSink};
pub use types::{FamilyNotification, NotificationEventType};
