//! Session state machine
//!
//! `SessionStateMachine` is the only code that changes a session's status or
//! its counters. It works on a session record the caller has loaded under the
//! session lock; persisting the result is the caller's job.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::record::LearningSession;
use super::state::{SessionStatus, Transition, Trigger};
use crate::analyzer::{ResolutionKind, Severity, SuspicionEvent, SuspicionScore};
use crate::config::{EngineConfig, SuspicionConfig};
use crate::error::EngineError;
use crate::interaction::{AnswerOutcome, Interaction, InteractionKind, ReplySource, TutorReply};
use crate::types::{EventId, InteractionId};

/// An interaction that has been moderated and answered but not yet recorded
#[derive(Debug, Clone)]
pub struct InteractionDraft {
    pub kind: InteractionKind,
    pub direct_answer_request: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub reply: TutorReply,
    pub pedagogy_enforced: bool,
    pub outcome: Option<AnswerOutcome>,
}

/// Everything produced by recording one interaction
#[derive(Debug, Clone)]
pub struct InteractionOutcome {
    pub interaction: Interaction,
    /// Raised when the score met the suspicion threshold.
    pub event: Option<SuspicionEvent>,
    pub transition: Option<Transition>,
}

/// Applies triggers and records interactions against a session
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    suspicion: SuspicionConfig,
    max_hint_count: u32,
}

impl SessionStateMachine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            suspicion: config.suspicion.clone(),
            max_hint_count: config.tutoring.max_hint_count,
        }
    }

    /// Apply a trigger, failing if the table has no entry for it
    ///
    /// On failure the session is left untouched.
    pub fn apply(
        &self,
        session: &mut LearningSession,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        let from = session.status;
        let to = from.next(trigger)?;
        session.status = to;
        session.touch(now);

        info!(
            session_id = %session.id,
            from = %from,
            to = %to,
            trigger = %trigger,
            "Session transitioned"
        );
        Ok(Transition { from, to, trigger })
    }

    /// Apply an automatic trigger; not applicable triggers are ignored
    fn apply_automatic(
        &self,
        session: &mut LearningSession,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        debug_assert!(trigger.is_automatic());
        if session.status.next(trigger).is_err() {
            debug!(
                session_id = %session.id,
                status = %session.status,
                trigger = %trigger,
                "Automatic trigger not applicable"
            );
            return None;
        }
        self.apply(session, trigger, now).ok()
    }

    /// Reserve one hint for an answer-seeking message
    ///
    /// Saturates at the configured maximum; returns whether a hint was taken.
    pub fn reserve_hint(&self, session: &mut LearningSession, now: DateTime<Utc>) -> bool {
        if session.hint_count >= self.max_hint_count {
            return false;
        }
        session.hint_count += 1;
        session.touch(now);
        true
    }

    /// Give back a hint whose AI response was discarded
    pub fn release_hint(&self, session: &mut LearningSession, now: DateTime<Utc>) {
        if session.hint_count > 0 {
            session.hint_count -= 1;
            session.touch(now);
        }
    }

    pub fn hints_remaining(&self, session: &LearningSession) -> u32 {
        self.max_hint_count.saturating_sub(session.hint_count)
    }

    /// Resolve open events whose score has decayed below the resolve floor
    ///
    /// Returns the ids of events resolved by this call.
    pub fn settle_open_events(
        &self,
        session: &LearningSession,
        events: &mut [SuspicionEvent],
        now: DateTime<Utc>,
    ) -> Vec<EventId> {
        let mut resolved = Vec::new();
        for event in events.iter_mut().filter(|e| !e.is_resolved()) {
            let decayed = event.decayed_score(
                session.last_violation_at,
                now,
                self.suspicion.decay_half_life_minutes,
            );
            if decayed < self.suspicion.decay_resolve_below
                && event.resolve(ResolutionKind::Decayed, None, now)
            {
                debug!(
                    session_id = %session.id,
                    event_id = %event.id,
                    decayed,
                    "Suspicion event decayed"
                );
                resolved.push(event.id.clone());
            }
        }
        resolved
    }

    /// Record a moderated interaction with its suspicion score
    ///
    /// `open_events` is the number of unresolved events before this
    /// interaction. Raises a suspicion event when the score meets the
    /// threshold and applies the resulting automatic transition.
    pub fn record_interaction(
        &self,
        session: &mut LearningSession,
        draft: InteractionDraft,
        score: &SuspicionScore,
        open_events: usize,
        now: DateTime<Utc>,
    ) -> InteractionOutcome {
        let interaction_id = InteractionId::generate();

        let event = score.exceeds(self.suspicion.threshold).then(|| {
            let severity = Severity::from_score(score.score, &self.suspicion);
            SuspicionEvent::new(
                session.id.clone(),
                interaction_id.clone(),
                score,
                severity,
                now,
            )
        });

        let trigger = match &event {
            Some(e)
                if e.severity == Severity::High
                    || open_events + 1 >= self.suspicion.auto_suspend_unresolved =>
            {
                Trigger::SevereSuspicion
            }
            Some(_) => Trigger::LowSeverityEvent,
            None => Trigger::InteractionRecorded,
        };
        let transition = self.apply_automatic(session, trigger, now);

        let seq = session.interaction_count;
        session.interaction_count += 1;
        if draft.reply.source == ReplySource::Tutor {
            session.ai_interaction_count += 1;
        }
        if draft.pedagogy_enforced || event.is_some() {
            session.safety_violation_count += 1;
            session.last_violation_at = Some(now);
        }
        session.last_activity_at = Some(draft.timestamp);
        session.touch(now);

        if let Some(event) = &event {
            info!(
                session_id = %session.id,
                score = event.score,
                severity = ?event.severity,
                signals = ?event.signals,
                "Suspicion event raised"
            );
        }

        let interaction = Interaction {
            id: interaction_id,
            session_id: session.id.clone(),
            seq,
            kind: draft.kind,
            direct_answer_request: draft.direct_answer_request,
            message: draft.message,
            timestamp: draft.timestamp,
            reply: draft.reply,
            suspicion_score: score.score,
            signals: score.signals.clone(),
            pedagogy_enforced: draft.pedagogy_enforced,
            outcome: draft.outcome,
            status_after: session.status,
        };

        InteractionOutcome {
            interaction,
            event,
            transition,
        }
    }
}

/// Whether a status change should cancel outstanding AI calls
pub fn cancels_tutoring(transition: &Transition) -> bool {
    transition.to.halts_tutoring() && transition.from != transition.to
}

/// Error for a student submission in a status that does not accept one
pub fn rejects_interaction(status: SessionStatus) -> Option<EngineError> {
    (!status.accepts_interactions()).then(|| EngineError::InvalidStateTransition {
        from: status,
        trigger: Trigger::InteractionRecorded.to_string(),
    })
}
