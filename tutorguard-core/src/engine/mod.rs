//! Session engine
//!
//! [`SessionEngine`] is the entry point for students and guardians. It wires
//! the analyzer, moderator, state machine, intervention coordinator and
//! analytics aggregator together over the collaborator traits, and serializes
//! every mutation of a session behind that session's lock.

mod intervene;
mod submit;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

pub use submit::{InteractionRequest, InteractionResult};

use crate::analytics::{AnalyticsAggregator, AnalyticsSnapshot, AnalyticsTarget, Timeframe};
use crate::analyzer::SuspicionAnalyzer;
use crate::config::{ConfigError, EngineConfig};
use crate::error::EngineError;
use crate::identity::{Role, RoleResolver};
use crate::interaction::Interaction;
use crate::intervention::InterventionCoordinator;
use crate::moderator::SocraticModerator;
use crate::notifications::{FamilyNotification, NotificationQueue};
use crate::session::{LearningSession, SessionLocks, SessionSnapshot, SessionStateMachine, StartSession};
use crate::store::{SessionRecords, SessionStore};
use crate::tutor::TutorBackend;
use crate::types::{ActorId, FamilyId, SessionId};
use crate::validation;

/// Supervised learning session engine
///
/// SessionEngine provides:
/// - Session start on first student activity
/// - Moderated, scored student interactions
/// - Idempotent guardian interventions
/// - Consistent session snapshots and analytics
pub struct SessionEngine {
    config: Arc<EngineConfig>,
    store: Arc<dyn SessionStore>,
    roles: Arc<dyn RoleResolver>,
    tutor: Arc<dyn TutorBackend>,
    notifier: NotificationQueue,
    locks: SessionLocks,
    machine: SessionStateMachine,
    analyzer: SuspicionAnalyzer,
    moderator: SocraticModerator,
    coordinator: InterventionCoordinator,
    aggregator: AnalyticsAggregator,
}

impl SessionEngine {
    /// Create an engine over its collaborators
    ///
    /// Fails if the configuration is inconsistent or a classifier pattern
    /// does not compile.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn SessionStore>,
        roles: Arc<dyn RoleResolver>,
        tutor: Arc<dyn TutorBackend>,
        notifier: NotificationQueue,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let machine = SessionStateMachine::new(&config);
        Ok(Self {
            locks: SessionLocks::new(&config.concurrency),
            analyzer: SuspicionAnalyzer::new(config.suspicion.clone()),
            moderator: SocraticModerator::new(&config.tutoring)?,
            coordinator: InterventionCoordinator::new(machine.clone(), &config.interventions),
            aggregator: AnalyticsAggregator::new(&config),
            machine,
            config: Arc::new(config),
            store,
            roles,
            tutor,
            notifier,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a session for a student's first activity
    pub async fn start_session(&self, request: StartSession) -> Result<SessionSnapshot, EngineError> {
        validation::validate_start(&request)?;

        let role = self
            .roles
            .role_of(&request.student_id, &request.family_id)
            .await?;
        if role != Role::Student {
            return Err(EngineError::PermissionDenied {
                actor: request.student_id.clone(),
                reason: "only a student of the family may start a session".to_string(),
            });
        }

        let now = Utc::now();
        let mut session = LearningSession::new(&request, &self.config.session, now);
        self.refresh_analytics(&mut session, &[], now).await?;
        self.store.insert_session(&session).await?;

        info!(
            session_id = %session.id,
            student_id = %session.student_id,
            mode = ?session.mode,
            "Session started"
        );
        self.notify(FamilyNotification::session_created(&session));

        let records = SessionRecords {
            session,
            interactions: Vec::new(),
            events: Vec::new(),
            actions: Vec::new(),
        };
        Ok(self.snapshot(&records, now))
    }

    /// Read a session as of its latest committed version
    ///
    /// Streak and progress span the student's other sessions and the current
    /// day, so they are recomputed for the read rather than taken from the
    /// stored record.
    pub async fn get_session(&self, id: &SessionId) -> Result<SessionSnapshot, EngineError> {
        let mut records = self.load(id).await?;
        let now = Utc::now();
        self.refresh_analytics(&mut records.session, &records.interactions, now)
            .await?;
        Ok(self.snapshot(&records, now))
    }

    /// Aggregate analytics for a session or a student
    pub async fn get_analytics(
        &self,
        target: AnalyticsTarget,
        timeframe: Timeframe,
    ) -> Result<AnalyticsSnapshot, EngineError> {
        let student = match &target {
            AnalyticsTarget::Session(id) => self.load(id).await?.session.student_id,
            AnalyticsTarget::Student(id) => id.clone(),
        };
        let history = self.student_history(&student).await?;
        Ok(self
            .aggregator
            .snapshot(target, timeframe, &history, Utc::now()))
    }

    /// Delivery audit of a family's notifications, oldest first
    pub async fn notifications_for(
        &self,
        family_id: &FamilyId,
    ) -> Result<Vec<FamilyNotification>, EngineError> {
        Ok(self.store.notifications_for(family_id).await?)
    }

    async fn load(&self, id: &SessionId) -> Result<SessionRecords, EngineError> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| EngineError::session_not_found(id))
    }

    /// Every session of a student with its logs, oldest first
    async fn student_history(&self, student: &ActorId) -> Result<Vec<SessionRecords>, EngineError> {
        let mut history = Vec::new();
        for session in self.store.sessions_for_student(student).await? {
            if let Some(records) = self.store.load(&session.id).await? {
                history.push(records);
            }
        }
        Ok(history)
    }

    /// Recompute the session's derived analytics fields
    ///
    /// `interactions` is the session's log including anything about to be
    /// committed; other sessions are read at their committed versions.
    async fn refresh_analytics(
        &self,
        session: &mut LearningSession,
        interactions: &[Interaction],
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let others: Vec<SessionRecords> = self
            .student_history(&session.student_id)
            .await?
            .into_iter()
            .filter(|r| r.session.id != session.id)
            .collect();
        let history: Vec<&Interaction> = others
            .iter()
            .flat_map(|r| r.interactions.iter())
            .chain(interactions.iter())
            .collect();
        self.aggregator.refresh(session, interactions, &history, now);
        Ok(())
    }

    fn snapshot(&self, records: &SessionRecords, now: DateTime<Utc>) -> SessionSnapshot {
        let session = &records.session;
        let half_life = self.config.suspicion.decay_half_life_minutes;
        let (open, level) = records.open_events().fold((0, 0.0_f64), |(n, level), event| {
            let decayed = event.decayed_score(session.last_violation_at, now, half_life);
            (n + 1, level.max(decayed))
        });
        SessionSnapshot {
            session: session.clone(),
            open_suspicion_events: open,
            suspicion_level: level,
        }
    }

    /// Hand a notification to the dispatcher; failures never reach the caller
    fn notify(&self, notification: FamilyNotification) {
        let notification_id = notification.id.clone();
        if let Err(e) = self.notifier.enqueue(notification) {
            warn!(
                notification_id = %notification_id,
                error = %e,
                "Failed to enqueue notification"
            );
        }
    }
}
