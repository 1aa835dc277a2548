//! The learning session record and its read-only snapshot

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::SessionStatus;
use crate::config::SessionDefaults;
use crate::types::{ActorId, FamilyId, MonitoringLevel, SessionId, SessionMode, Subject};

/// A supervised learning session
///
/// Owned by the engine: created on the first student activity, mutated only
/// through the state machine, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningSession {
    pub id: SessionId,
    pub student_id: ActorId,
    pub family_id: FamilyId,
    pub status: SessionStatus,
    pub mode: SessionMode,
    /// 1-10
    pub difficulty: u8,
    pub subjects: BTreeSet<Subject>,
    pub current_topic: Option<String>,
    pub monitoring_level: MonitoringLevel,
    pub requires_parent_approval: bool,
    /// Guardians may switch the AI tutor off for a session.
    pub ai_enabled: bool,
    /// Cumulative learning time in seconds, idle gaps capped.
    pub learning_time_secs: i64,
    /// Interactions recorded so far; also the next interaction sequence number.
    pub interaction_count: u32,
    /// Interactions answered by the AI engine.
    pub ai_interaction_count: u32,
    pub streak_days: u32,
    pub safety_violation_count: u32,
    pub intervention_count: u32,
    /// Always recomputed from the log, in [0, 1].
    pub progress_score: f64,
    /// Never exceeds the configured maximum.
    pub hint_count: u32,
    /// Last suspicion event or policy violation; open events decay from here.
    pub last_violation_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Incremented on every committed mutation.
    pub version: u64,
}

impl LearningSession {
    /// Create a new ACTIVE session
    pub fn new(request: &StartSession, defaults: &SessionDefaults, now: DateTime<Utc>) -> Self {
        let subjects = request
            .subjects
            .clone()
            .unwrap_or_else(|| defaults.subjects.iter().copied().collect());

        Self {
            id: SessionId::generate(),
            student_id: request.student_id.clone(),
            family_id: request.family_id.clone(),
            status: SessionStatus::Active,
            mode: request.mode.unwrap_or(defaults.mode),
            difficulty: request.difficulty.unwrap_or(defaults.difficulty),
            subjects,
            current_topic: request.topic.clone(),
            monitoring_level: request.monitoring_level.unwrap_or(defaults.monitoring_level),
            requires_parent_approval: request
                .requires_parent_approval
                .unwrap_or(defaults.requires_parent_approval),
            ai_enabled: true,
            learning_time_secs: 0,
            interaction_count: 0,
            ai_interaction_count: 0,
            streak_days: 0,
            safety_violation_count: 0,
            intervention_count: 0,
            progress_score: 0.0,
            hint_count: 0,
            last_violation_at: None,
            created_at: now,
            updated_at: now,
            last_activity_at: None,
            version: 0,
        }
    }

    /// Mark a committed mutation
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}

/// Parameters for starting a session on the first student activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSession {
    pub student_id: ActorId,
    pub family_id: FamilyId,
    #[serde(default)]
    pub mode: Option<SessionMode>,
    #[serde(default)]
    pub difficulty: Option<u8>,
    #[serde(default)]
    pub subjects: Option<BTreeSet<Subject>>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub monitoring_level: Option<MonitoringLevel>,
    #[serde(default)]
    pub requires_parent_approval: Option<bool>,
}

impl StartSession {
    pub fn new(student_id: impl Into<ActorId>, family_id: impl Into<FamilyId>) -> Self {
        Self {
            student_id: student_id.into(),
            family_id: family_id.into(),
            mode: None,
            difficulty: None,
            subjects: None,
            topic: None,
            monitoring_level: None,
            requires_parent_approval: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: u8) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    #[must_use]
    pub fn with_subjects(mut self, subjects: impl IntoIterator<Item = Subject>) -> Self {
        self.subjects = Some(subjects.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_parent_approval(mut self, required: bool) -> Self {
        self.requires_parent_approval = Some(required);
        self
    }

    #[must_use]
    pub fn with_monitoring_level(mut self, level: MonitoringLevel) -> Self {
        self.monitoring_level = Some(level);
        self
    }
}

/// Consistent read-only view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: LearningSession,
    /// Unresolved suspicion events at snapshot time.
    pub open_suspicion_events: usize,
    /// Highest decayed score among unresolved events.
    pub suspicion_level: f64,
}

impl SessionSnapshot {
    pub fn status(&self) -> SessionStatus {
        self.session.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_active_with_defaults() {
        let defaults = SessionDefaults::default();
        let session =
            LearningSession::new(&StartSession::new("kid", "fam"), &defaults, Utc::now());

        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.mode, SessionMode::Socratic);
        assert_eq!(session.difficulty, 5);
        assert_eq!(session.subjects.len(), 4);
        assert!(session.ai_enabled);
        assert_eq!(session.version, 0);
        assert_eq!(session.progress_score, 0.0);
    }

    #[test]
    fn start_request_carries_no_overrides() {
        let request = StartSession::new("kid", "fam");
        assert_eq!(request.student_id.as_str(), "kid");
        assert_eq!(request.family_id.as_str(), "fam");
        assert!(request.mode.is_none());
        assert!(request.difficulty.is_none());
        assert!(request.subjects.is_none());
        assert!(request.topic.is_none());
        assert!(request.monitoring_level.is_none());
        assert!(request.requires_parent_approval.is_none());
    }

    #[test]
    fn start_request_overrides_defaults() {
        let request = StartSession::new("kid", "fam")
            .with_mode(SessionMode::Practice)
            .with_difficulty(8)
            .with_subjects([Subject::History])
            .with_parent_approval(false);
        let session = LearningSession::new(&request, &SessionDefaults::default(), Utc::now());

        assert_eq!(session.mode, SessionMode::Practice);
        assert_eq!(session.difficulty, 8);
        assert!(session.subjects.contains(&Subject::History));
        assert_eq!(session.subjects.len(), 1);
        assert!(!session.requires_parent_approval);
    }

    #[test]
    fn touch_bumps_version() {
        let now = Utc::now();
        let mut session =
            LearningSession::new(&StartSession::new("kid", "fam"), &SessionDefaults::default(), now);
        session.touch(now);
        session.touch(now);
        assert_eq!(session.version, 2);
    }
}
