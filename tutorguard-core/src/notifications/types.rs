//! Family notification records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analyzer::SuspicionEvent;
use crate::intervention::InterventionAction;
use crate::session::{LearningSession, Transition};
use crate::types::{FamilyId, NotificationId, SessionId};

/// Kinds of session events guardians are told about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEventType {
    SessionCreated,
    StatusChanged,
    SuspicionRaised,
    InterventionApplied,
}

/// A notification for the guardians of one family
///
/// Owned by the dispatcher once enqueued; `attempts`, `delivered` and
/// `last_error` record the delivery history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyNotification {
    pub id: NotificationId,
    pub family_id: FamilyId,
    pub session_id: SessionId,
    pub event_type: NotificationEventType,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    pub delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl FamilyNotification {
    fn new(
        session: &LearningSession,
        event_type: NotificationEventType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            family_id: session.family_id.clone(),
            session_id: session.id.clone(),
            event_type,
            payload,
            created_at: Utc::now(),
            attempts: 0,
            delivered: false,
            delivered_at: None,
            last_error: None,
        }
    }

    /// A student started a session
    pub fn session_created(session: &LearningSession) -> Self {
        Self::new(
            session,
            NotificationEventType::SessionCreated,
            json!({
                "student_id": session.student_id,
                "mode": session.mode,
                "subjects": session.subjects,
                "difficulty": session.difficulty,
            }),
        )
    }

    /// The session changed status
    pub fn status_changed(session: &LearningSession, transition: &Transition) -> Self {
        Self::new(
            session,
            NotificationEventType::StatusChanged,
            json!({
                "from": transition.from,
                "to": transition.to,
                "trigger": transition.trigger,
            }),
        )
    }

    /// A suspicion event was raised and is unresolved
    pub fn suspicion_raised(session: &LearningSession, event: &SuspicionEvent) -> Self {
        Self::new(
            session,
            NotificationEventType::SuspicionRaised,
            json!({
                "event_id": event.id,
                "score": event.score,
                "severity": event.severity,
                "signals": event.signals,
                "recommended_action": event.severity.recommended_action(),
                "status": session.status,
            }),
        )
    }

    /// A guardian intervention was applied
    pub fn intervention_applied(session: &LearningSession, action: &InterventionAction) -> Self {
        Self::new(
            session,
            NotificationEventType::InterventionApplied,
            json!({
                "action_id": action.id,
                "guardian_id": action.guardian_id,
                "action": action.kind,
                "message": action.message,
                "previous_status": action.previous_status,
                "resulting_status": action.resulting_status,
            }),
        )
    }

    pub fn is_pending(&self) -> bool {
        !self.delivered && self.last_error.is_none()
    }
}
