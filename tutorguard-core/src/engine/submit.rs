//! Student interaction flow
//!
//! A submission runs in three steps. Under the session lock the message is
//! validated, authorized and moderated, and any hint is reserved. The AI call
//! runs without the lock. The lock is then taken again to score and record the
//! interaction, unless the session halted tutoring in the meantime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::SessionEngine;
use crate::analyzer::{DeviceSignals, ScoringInput, Severity};
use crate::error::EngineError;
use crate::identity::Role;
use crate::interaction::{AnswerOutcome, InteractionKind, TutorReply};
use crate::moderator::ModerationDecision;
use crate::notifications::FamilyNotification;
use crate::session::machine::{cancels_tutoring, rejects_interaction};
use crate::session::{InteractionDraft, LearningSession, SessionGuard, SessionStatus};
use crate::store::{SessionCommit, SessionRecords};
use crate::types::{ActorId, InteractionId, SessionId};
use crate::validation;

/// A student message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub session_id: SessionId,
    pub actor_id: ActorId,
    pub message: String,
    #[serde(default)]
    pub device: DeviceSignals,
    /// Grade for an answer, from the external grader.
    #[serde(default)]
    pub outcome: Option<AnswerOutcome>,
    /// Client send time; defaults to arrival time.
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

impl InteractionRequest {
    pub fn new(
        session_id: impl Into<SessionId>,
        actor_id: impl Into<ActorId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            actor_id: actor_id.into(),
            message: message.into(),
            device: DeviceSignals::default(),
            outcome: None,
            sent_at: None,
        }
    }

    #[must_use]
    pub fn with_device(mut self, device: DeviceSignals) -> Self {
        self.device = device;
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: AnswerOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn sent_at(mut self, at: DateTime<Utc>) -> Self {
        self.sent_at = Some(at);
        self
    }
}

/// What the student gets back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionResult {
    /// `None` when nothing was recorded.
    pub interaction_id: Option<InteractionId>,
    pub reply: Option<TutorReply>,
    pub status: SessionStatus,
    /// False when the AI response was discarded because tutoring halted.
    pub recorded: bool,
    pub suspicion_score: f64,
    pub signals: Vec<String>,
    pub severity: Option<Severity>,
    /// The score met the suspicion threshold and an event was raised.
    pub threshold_exceeded: bool,
    pub pedagogy_enforced: bool,
    /// The AI engine timed out and the fallback prompt was used.
    pub degraded: bool,
    pub hints_remaining: u32,
}

/// Moderation result carried from the first locked step to the recording step
struct Pending {
    draft: InteractionDraft,
    hint_reserved: bool,
}

impl SessionEngine {
    /// Moderate, answer, score and record a student message
    pub async fn submit_interaction(
        &self,
        request: InteractionRequest,
    ) -> Result<InteractionResult, EngineError> {
        validation::validate_message(&request.message, self.config.session.max_message_chars)?;
        let received_at = Utc::now();
        let timestamp = request.sent_at.unwrap_or(received_at);

        let guard = self.locks.acquire(&request.session_id).await?;
        let mut records = self.load(&request.session_id).await?;
        self.authorize_student(&request.actor_id, &records.session)
            .await?;
        if let Some(err) = rejects_interaction(records.session.status) {
            return Err(err);
        }

        let decision = self.moderator.moderate(&records.session, &request.message);
        let classification = decision.classification().clone();
        let kind = match classification.kind {
            InteractionKind::Question if request.outcome.is_some() => InteractionKind::Answer,
            kind => kind,
        };
        let draft = |reply: TutorReply, pedagogy_enforced: bool| InteractionDraft {
            kind,
            direct_answer_request: classification.direct_answer_request,
            message: request.message.clone(),
            timestamp,
            reply,
            pedagogy_enforced,
            outcome: request.outcome,
        };

        let (consumes_hint, constraints) = match decision {
            ModerationDecision::Block {
                counter_question, ..
            } => {
                let pending = Pending {
                    draft: draft(TutorReply::moderator(counter_question), true),
                    hint_reserved: false,
                };
                return self
                    .record(guard, records, pending, &request.device, false)
                    .await;
            }
            ModerationDecision::Disabled { notice, .. } => {
                let pending = Pending {
                    draft: draft(TutorReply::moderator(notice), false),
                    hint_reserved: false,
                };
                return self
                    .record(guard, records, pending, &request.device, false)
                    .await;
            }
            ModerationDecision::Forward {
                consumes_hint,
                constraints,
                ..
            } => (consumes_hint, constraints),
        };

        let hint_reserved = consumes_hint && self.machine.reserve_hint(&mut records.session, received_at);
        if hint_reserved {
            self.store.update_session(&records.session).await?;
        }
        let cancelled = guard.cancel_token();
        drop(guard);

        let forwarded = self
            .moderator
            .forward(self.tutor.as_ref(), &request.message, &constraints)
            .await;
        let degraded = forwarded.degraded();

        // The hint is already reserved; wait rather than drop the reply.
        let guard = self.locks.wait_for(&request.session_id).await;
        let mut records = self.load(&request.session_id).await?;

        if cancelled.is_cancelled() || !records.session.status.accepts_interactions() {
            if hint_reserved {
                self.machine.release_hint(&mut records.session, Utc::now());
                self.store.update_session(&records.session).await?;
            }
            drop(guard);
            info!(
                session_id = %records.session.id,
                status = %records.session.status,
                degraded,
                "Tutoring halted during AI call, response discarded"
            );
            return Ok(InteractionResult {
                interaction_id: None,
                reply: degraded.then_some(forwarded.reply),
                status: records.session.status,
                recorded: false,
                suspicion_score: 0.0,
                signals: Vec::new(),
                severity: None,
                threshold_exceeded: false,
                pedagogy_enforced: false,
                degraded,
                hints_remaining: self.machine.hints_remaining(&records.session),
            });
        }

        let pending = Pending {
            draft: draft(forwarded.reply, false),
            hint_reserved,
        };
        self.record(guard, records, pending, &request.device, degraded)
            .await
    }

    /// Score and commit a moderated interaction, then notify
    ///
    /// Runs under `guard`; the lock is released before notifications go out.
    async fn record(
        &self,
        mut guard: SessionGuard,
        mut records: SessionRecords,
        pending: Pending,
        device: &DeviceSignals,
        degraded: bool,
    ) -> Result<InteractionResult, EngineError> {
        let now = Utc::now();
        let Pending {
            draft,
            hint_reserved,
        } = pending;

        let resolved = self
            .machine
            .settle_open_events(&records.session, &mut records.events, now);
        let open_events = records.open_events().count();

        let input = ScoringInput {
            message: &draft.message,
            timestamp: draft.timestamp,
            outcome: draft.outcome,
            difficulty: records.session.difficulty,
            device,
            content: self.moderator.content_hits(&draft.message),
        };
        let score = self.analyzer.analyze(
            &input,
            &records.interactions,
            records.session.monitoring_level,
        );

        let outcome =
            self.machine
                .record_interaction(&mut records.session, draft, &score, open_events, now);
        records.interactions.push(outcome.interaction.clone());
        self.refresh_analytics(&mut records.session, &records.interactions, now)
            .await?;

        let resolved_events = records
            .events
            .iter()
            .filter(|e| resolved.contains(&e.id))
            .cloned()
            .collect();
        self.store
            .commit(SessionCommit {
                session: records.session.clone(),
                interactions: vec![outcome.interaction.clone()],
                new_events: outcome.event.iter().cloned().collect(),
                resolved_events,
                actions: Vec::new(),
            })
            .await?;

        if let Some(transition) = &outcome.transition
            && cancels_tutoring(transition)
        {
            guard.cancel_in_flight();
        }
        drop(guard);

        debug!(
            session_id = %records.session.id,
            seq = outcome.interaction.seq,
            kind = ?outcome.interaction.kind,
            score = score.score,
            hint_reserved,
            "Interaction recorded"
        );

        let session = &records.session;
        if let Some(transition) = &outcome.transition {
            self.notify(FamilyNotification::status_changed(session, transition));
        }
        if let Some(event) = &outcome.event {
            self.notify(FamilyNotification::suspicion_raised(session, event));
        }

        let interaction = outcome.interaction;
        Ok(InteractionResult {
            interaction_id: Some(interaction.id),
            reply: Some(interaction.reply),
            status: session.status,
            recorded: true,
            suspicion_score: score.score,
            signals: score.signals,
            severity: outcome.event.as_ref().map(|e| e.severity),
            threshold_exceeded: outcome.event.is_some(),
            pedagogy_enforced: interaction.pedagogy_enforced,
            degraded,
            hints_remaining: self.machine.hints_remaining(session),
        })
    }

    async fn authorize_student(
        &self,
        actor: &ActorId,
        session: &LearningSession,
    ) -> Result<(), EngineError> {
        let role = self.roles.role_of(actor, &session.family_id).await?;
        if role != Role::Student || actor != &session.student_id {
            return Err(EngineError::PermissionDenied {
                actor: actor.clone(),
                reason: "only the session's student may submit messages".to_string(),
            });
        }
        Ok(())
    }
}
