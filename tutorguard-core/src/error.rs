//! Error types for tutorguard-core

use thiserror::Error;

use crate::session::SessionStatus;
use crate::types::{ActorId, SessionId};

/// Top-level error type returned by engine operations
///
/// Every variant is fatal to the request that produced it only; the session
/// is left exactly as it was before the request.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Permission denied for {actor}: {reason}")]
    PermissionDenied { actor: ActorId, reason: String },

    #[error("Parent approval required to change {}", fields.join(", "))]
    ApprovalRequired { fields: Vec<String> },

    #[error("Invalid state transition: {trigger} is not allowed from {from}")]
    InvalidStateTransition { from: SessionStatus, trigger: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Session {session_id} is busy, retry after {retry_after_ms}ms")]
    SessionBusy {
        session_id: SessionId,
        retry_after_ms: u64,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl EngineError {
    pub(crate) fn session_not_found(id: &SessionId) -> Self {
        EngineError::NotFound {
            kind: "Session",
            id: id.to_string(),
        }
    }

    /// Whether the caller may retry the identical request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::SessionBusy { .. } | EngineError::Storage(_))
    }
}

/// Malformed input; the caller's fault and never retried
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("message is {len} characters, maximum is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("difficulty {0} is outside 1-10")]
    DifficultyOutOfRange(u8),

    #[error("at least one subject is required")]
    NoSubjects,

    #[error("redirect requires a new topic or subject set")]
    EmptyRedirect,

    #[error("{0}")]
    Invalid(String),
}

/// Errors from the AI generation collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TutorError {
    #[error("AI engine did not respond within {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("AI engine unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the persistence collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend failure: {0}")]
    Backend(String),
}

/// Errors related to family notifications
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotificationError {
    #[error("Failed to deliver notification: {0}")]
    DeliveryFailed(String),

    #[error("Notification queue is closed")]
    QueueClosed,

    #[error("Notification queue is full")]
    QueueFull,
}
