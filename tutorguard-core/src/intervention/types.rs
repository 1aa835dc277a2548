//! Intervention requests, audit records and settings changes

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{LearningSession, SessionStatus, Trigger};
use crate::types::{ActionId, ActorId, EventId, SessionId, Subject};

/// Guardian action on a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    Pause,
    Resume,
    Block,
    /// Clear monitoring and resolve open suspicion events
    Allow,
    /// Reassign topic or subjects and return to ACTIVE
    Redirect,
}

impl InterventionKind {
    pub fn trigger(self) -> Trigger {
        match self {
            InterventionKind::Pause => Trigger::Pause,
            InterventionKind::Resume => Trigger::Resume,
            InterventionKind::Block => Trigger::Block,
            InterventionKind::Allow => Trigger::Allow,
            InterventionKind::Redirect => Trigger::Redirect,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InterventionKind::Pause => "pause",
            InterventionKind::Resume => "resume",
            InterventionKind::Block => "block",
            InterventionKind::Allow => "allow",
            InterventionKind::Redirect => "redirect",
        }
    }
}

impl fmt::Display for InterventionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session settings a guardian may change along with an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsChange {
    pub difficulty: Option<u8>,
    pub subjects: Option<BTreeSet<Subject>>,
    pub ai_enabled: Option<bool>,
    pub topic: Option<String>,
}

impl SettingsChange {
    /// Fields that need explicit approval when the session requires it
    pub const PROTECTED_FIELDS: [&'static str; 3] = ["difficulty", "subjects", "ai_enabled"];

    pub fn is_empty(&self) -> bool {
        self == &SettingsChange::default()
    }

    /// Protected fields whose value would actually change
    pub fn protected_changes(&self, session: &LearningSession) -> Vec<String> {
        let mut fields = Vec::new();
        if self.difficulty.is_some_and(|d| d != session.difficulty) {
            fields.push("difficulty".to_string());
        }
        if self.subjects.as_ref().is_some_and(|s| s != &session.subjects) {
            fields.push("subjects".to_string());
        }
        if self.ai_enabled.is_some_and(|a| a != session.ai_enabled) {
            fields.push("ai_enabled".to_string());
        }
        fields
    }

    /// Whether the change reassigns what the student works on
    pub fn reassigns(&self) -> bool {
        self.topic.is_some() || self.subjects.is_some()
    }

    pub(crate) fn apply_to(&self, session: &mut LearningSession) {
        if let Some(difficulty) = self.difficulty {
            session.difficulty = difficulty;
        }
        if let Some(subjects) = &self.subjects {
            session.subjects = subjects.clone();
        }
        if let Some(enabled) = self.ai_enabled {
            session.ai_enabled = enabled;
        }
        if let Some(topic) = &self.topic {
            session.current_topic = Some(topic.trim().to_string());
        }
    }
}

/// A guardian's request to act on a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionRequest {
    pub session_id: SessionId,
    pub actor_id: ActorId,
    pub kind: InterventionKind,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub settings: SettingsChange,
    /// Explicit parent approval for protected setting changes.
    #[serde(default)]
    pub approved: bool,
    /// Caller-chosen idempotency key; takes precedence over derived ids.
    #[serde(default)]
    pub request_id: Option<String>,
    /// When the guardian issued the action; defaults to arrival time.
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
}

impl InterventionRequest {
    pub fn new(
        session_id: impl Into<SessionId>,
        actor_id: impl Into<ActorId>,
        kind: InterventionKind,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            actor_id: actor_id.into(),
            kind,
            message: None,
            settings: SettingsChange::default(),
            approved: false,
            request_id: None,
            issued_at: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SettingsChange) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn approved(mut self) -> Self {
        self.approved = true;
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn issued_at(mut self, at: DateTime<Utc>) -> Self {
        self.issued_at = Some(at);
        self
    }
}

/// Append-only audit record of an applied intervention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionAction {
    pub id: ActionId,
    pub session_id: SessionId,
    pub guardian_id: ActorId,
    pub kind: InterventionKind,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub previous_status: SessionStatus,
    pub resulting_status: SessionStatus,
    pub settings: SettingsChange,
    /// Suspicion events cleared by this action.
    pub resolved_events: Vec<EventId>,
}

/// Outcome of an intervention request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionResult {
    pub action: InterventionAction,
    /// The request matched an already applied action; nothing changed.
    pub replayed: bool,
}

impl InterventionResult {
    pub fn status(&self) -> SessionStatus {
        self.action.resulting_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionDefaults;
    use crate::session::StartSession;

    fn session() -> LearningSession {
        LearningSession::new(
            &StartSession::new("kid", "fam"),
            &SessionDefaults::default(),
            Utc::now(),
        )
    }

    #[test]
    fn kinds_map_to_guardian_triggers() {
        for kind in [
            InterventionKind::Pause,
            InterventionKind::Resume,
            InterventionKind::Block,
            InterventionKind::Allow,
            InterventionKind::Redirect,
        ] {
            assert!(!kind.trigger().is_automatic());
            assert_eq!(kind.to_string(), kind.trigger().to_string());
        }
    }

    #[test]
    fn unchanged_values_are_not_protected_changes() {
        let session = session();
        let change = SettingsChange {
            difficulty: Some(session.difficulty),
            ai_enabled: Some(true),
            ..Default::default()
        };
        assert!(change.protected_changes(&session).is_empty());
    }

    #[test]
    fn protected_changes_are_named() {
        let session = session();
        let change = SettingsChange {
            difficulty: Some(9),
            ai_enabled: Some(false),
            topic: Some("fractions".to_string()),
            ..Default::default()
        };
        assert_eq!(
            change.protected_changes(&session),
            vec!["difficulty".to_string(), "ai_enabled".to_string()]
        );
    }

    #[test]
    fn apply_updates_session() {
        let mut session = session();
        let change = SettingsChange {
            subjects: Some([Subject::Art].into_iter().collect()),
            topic: Some("  colour wheels ".to_string()),
            ..Default::default()
        };
        change.apply_to(&mut session);
        assert_eq!(session.subjects.len(), 1);
        assert_eq!(session.current_topic.as_deref(), Some("colour wheels"));
        assert!(change.reassigns());
    }

    #[test]
    fn empty_change() {
        assert!(SettingsChange::default().is_empty());
    }
}
