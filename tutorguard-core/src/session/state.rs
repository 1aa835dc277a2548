//! Session status and the transition table
//!
//! Every status change in the engine goes through [`SessionStatus::next`].
//! BLOCKED and SUSPENDED are terminal for a session instance; learning resumes
//! only in a new session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Status of a learning session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Started, or returned to after a guardian action
    Active,
    /// At least one interaction recorded without suspicion
    Learning,
    /// Paused by a guardian
    Paused,
    /// Blocked by a guardian (terminal)
    Blocked,
    /// Suspended after severe or repeated suspicion (terminal)
    Suspended,
    /// Under increased monitoring after a suspicion event
    Monitored,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 6] = [
        SessionStatus::Active,
        SessionStatus::Learning,
        SessionStatus::Paused,
        SessionStatus::Blocked,
        SessionStatus::Suspended,
        SessionStatus::Monitored,
    ];

    /// Whether the session instance can never leave this status
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Blocked | SessionStatus::Suspended)
    }

    /// Whether student messages are accepted in this status
    pub fn accepts_interactions(self) -> bool {
        matches!(
            self,
            SessionStatus::Active | SessionStatus::Learning | SessionStatus::Monitored
        )
    }

    /// Whether entering this status cancels outstanding AI calls
    pub fn halts_tutoring(self) -> bool {
        matches!(
            self,
            SessionStatus::Paused | SessionStatus::Blocked | SessionStatus::Suspended
        )
    }

    /// Apply a trigger to this status
    ///
    /// Returns the next status, or `InvalidStateTransition` when the trigger is
    /// not allowed from the current status.
    pub fn next(self, trigger: Trigger) -> Result<SessionStatus, EngineError> {
        use SessionStatus::*;

        let next = match (trigger, self) {
            (Trigger::InteractionRecorded, Active) => Some(Learning),
            (Trigger::LowSeverityEvent, Active | Learning) => Some(Monitored),
            (Trigger::SevereSuspicion, s) if !s.is_terminal() => Some(Suspended),
            (Trigger::Pause, Active | Learning | Monitored) => Some(Paused),
            (Trigger::Resume, Paused) => Some(Active),
            (Trigger::Block, s) if !s.is_terminal() => Some(Blocked),
            (Trigger::Allow, Monitored) => Some(Active),
            (Trigger::Redirect, s) if !s.is_terminal() => Some(Active),
            _ => None,
        };

        next.ok_or_else(|| EngineError::InvalidStateTransition {
            from: self,
            trigger: trigger.to_string(),
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Learning => "LEARNING",
            SessionStatus::Paused => "PAUSED",
            SessionStatus::Blocked => "BLOCKED",
            SessionStatus::Suspended => "SUSPENDED",
            SessionStatus::Monitored => "MONITORED",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that may move a session to a new status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// An interaction was recorded without raising a suspicion event
    InteractionRecorded,
    /// A low or medium severity suspicion event was raised
    LowSeverityEvent,
    /// A high severity event, or too many unresolved events
    SevereSuspicion,
    Pause,
    Resume,
    Block,
    Allow,
    Redirect,
}

impl Trigger {
    /// Automatic triggers are no-ops when the table has no entry for the
    /// current status; guardian triggers fail instead.
    pub fn is_automatic(self) -> bool {
        matches!(
            self,
            Trigger::InteractionRecorded | Trigger::LowSeverityEvent | Trigger::SevereSuspicion
        )
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::InteractionRecorded => "interaction",
            Trigger::LowSeverityEvent => "low_severity_event",
            Trigger::SevereSuspicion => "severe_suspicion",
            Trigger::Pause => "pause",
            Trigger::Resume => "resume",
            Trigger::Block => "block",
            Trigger::Allow => "allow",
            Trigger::Redirect => "redirect",
        };
        f.write_str(name)
    }
}

/// An accepted status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: SessionStatus,
    pub to: SessionStatus,
    pub trigger: Trigger,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIGGERS: [Trigger; 8] = [
        Trigger::InteractionRecorded,
        Trigger::LowSeverityEvent,
        Trigger::SevereSuspicion,
        Trigger::Pause,
        Trigger::Resume,
        Trigger::Block,
        Trigger::Allow,
        Trigger::Redirect,
    ];

    // ==================== Table Tests ====================

    #[test]
    fn first_interaction_moves_active_to_learning() {
        assert_eq!(
            SessionStatus::Active.next(Trigger::InteractionRecorded).unwrap(),
            SessionStatus::Learning
        );
    }

    #[test]
    fn interaction_from_learning_is_not_a_transition() {
        assert!(
            SessionStatus::Learning
                .next(Trigger::InteractionRecorded)
                .is_err()
        );
    }

    #[test]
    fn low_severity_event_monitors_active_and_learning() {
        for from in [SessionStatus::Active, SessionStatus::Learning] {
            assert_eq!(
                from.next(Trigger::LowSeverityEvent).unwrap(),
                SessionStatus::Monitored
            );
        }
        assert!(SessionStatus::Paused.next(Trigger::LowSeverityEvent).is_err());
    }

    #[test]
    fn severe_suspicion_suspends_any_non_terminal() {
        for from in SessionStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert_eq!(
                from.next(Trigger::SevereSuspicion).unwrap(),
                SessionStatus::Suspended
            );
        }
    }

    #[test]
    fn pause_and_resume() {
        assert_eq!(
            SessionStatus::Monitored.next(Trigger::Pause).unwrap(),
            SessionStatus::Paused
        );
        assert_eq!(
            SessionStatus::Paused.next(Trigger::Resume).unwrap(),
            SessionStatus::Active
        );
        assert!(SessionStatus::Active.next(Trigger::Resume).is_err());
        assert!(SessionStatus::Paused.next(Trigger::Pause).is_err());
    }

    #[test]
    fn allow_only_clears_monitoring() {
        assert_eq!(
            SessionStatus::Monitored.next(Trigger::Allow).unwrap(),
            SessionStatus::Active
        );
        assert!(SessionStatus::Learning.next(Trigger::Allow).is_err());
    }

    #[test]
    fn redirect_reactivates_paused_session() {
        assert_eq!(
            SessionStatus::Paused.next(Trigger::Redirect).unwrap(),
            SessionStatus::Active
        );
    }

    #[test]
    fn invalid_transition_reports_origin() {
        let err = SessionStatus::Learning.next(Trigger::Allow).unwrap_err();
        match err {
            EngineError::InvalidStateTransition { from, trigger } => {
                assert_eq!(from, SessionStatus::Learning);
                assert_eq!(trigger, "allow");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    // ==================== Invariant Tests ====================

    #[test]
    fn terminal_states_are_never_exited() {
        for from in [SessionStatus::Blocked, SessionStatus::Suspended] {
            for trigger in TRIGGERS {
                assert!(
                    from.next(trigger).is_err(),
                    "{from} must not accept {trigger}"
                );
            }
        }
    }

    #[test]
    fn every_reachable_sequence_stays_in_the_state_set() {
        // Breadth-first walk over the table from the initial state.
        let mut seen = vec![SessionStatus::Active];
        let mut frontier = vec![SessionStatus::Active];
        while let Some(status) = frontier.pop() {
            for trigger in TRIGGERS {
                if let Ok(next) = status.next(trigger) {
                    assert!(SessionStatus::ALL.contains(&next));
                    if !seen.contains(&next) {
                        seen.push(next);
                        frontier.push(next);
                    }
                }
            }
        }
        assert_eq!(seen.len(), SessionStatus::ALL.len());
    }

    #[test]
    fn accepting_statuses() {
        assert!(SessionStatus::Monitored.accepts_interactions());
        assert!(!SessionStatus::Paused.accepts_interactions());
        assert!(!SessionStatus::Suspended.accepts_interactions());
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&SessionStatus::Monitored).unwrap();
        assert_eq!(json, "\"MONITORED\"");
    }
}
