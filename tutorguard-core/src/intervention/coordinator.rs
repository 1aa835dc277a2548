//! Intervention coordinator
//!
//! Works on session records loaded under the session lock. Role checks and
//! replay lookups need the store and live in the engine; everything here is
//! synchronous and leaves the records untouched on error.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::types::{InterventionAction, InterventionKind, InterventionRequest};
use crate::analyzer::ResolutionKind;
use crate::config::InterventionConfig;
use crate::error::EngineError;
use crate::session::{SessionStateMachine, Transition};
use crate::store::SessionRecords;
use crate::types::{ActionId, EventId};

/// Namespace for deterministic intervention action ids
const ACTION_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6d, 0x2f, 0x1c, 0x8e, 0x43, 0xa1, 0x4b, 0x57, 0x9e, 0x0d, 0x7a, 0x55, 0x31, 0xc2, 0xf4, 0x90,
]);

/// An applied intervention before it is committed
#[derive(Debug, Clone)]
pub struct AppliedIntervention {
    pub action: InterventionAction,
    pub transition: Transition,
}

/// Applies guardian actions idempotently
#[derive(Debug, Clone)]
pub struct InterventionCoordinator {
    machine: SessionStateMachine,
    bucket_secs: i64,
}

impl InterventionCoordinator {
    pub fn new(machine: SessionStateMachine, config: &InterventionConfig) -> Self {
        Self {
            machine,
            bucket_secs: config.idempotency_bucket_secs.max(1),
        }
    }

    /// Deterministic id for a request
    ///
    /// A caller-supplied request id wins. Otherwise identical session, actor,
    /// action, message, settings and approval within one timestamp bucket map
    /// to the same id.
    pub fn action_id(&self, request: &InterventionRequest, received_at: DateTime<Utc>) -> ActionId {
        let name = match &request.request_id {
            Some(request_id) => format!("{}|request|{}", request.session_id, request_id.trim()),
            None => {
                let issued = request.issued_at.unwrap_or(received_at);
                let bucket = issued.timestamp().div_euclid(self.bucket_secs);
                // Field order is fixed and subjects are a BTreeSet, so the
                // encoding is canonical.
                let settings = serde_json::to_string(&request.settings).unwrap_or_default();
                format!(
                    "{}|{}|{}|{}|{}|{}|{}",
                    request.session_id,
                    request.actor_id,
                    request.kind,
                    request.message.as_deref().unwrap_or(""),
                    settings,
                    request.approved,
                    bucket
                )
            }
        };
        ActionId::new(Uuid::new_v5(&ACTION_NAMESPACE, name.as_bytes()).to_string())
    }

    /// Apply a validated request to the loaded records
    ///
    /// The caller has already checked the actor's role. Fails with
    /// `ApprovalRequired` or `InvalidStateTransition` without touching the
    /// records.
    pub fn apply(
        &self,
        records: &mut SessionRecords,
        request: &InterventionRequest,
        action_id: ActionId,
        now: DateTime<Utc>,
    ) -> Result<AppliedIntervention, EngineError> {
        let session = &records.session;

        if session.requires_parent_approval && !request.approved {
            let fields = request.settings.protected_changes(session);
            if !fields.is_empty() {
                info!(
                    session_id = %session.id,
                    action = %request.kind,
                    fields = ?fields,
                    "Intervention needs parent approval"
                );
                return Err(EngineError::ApprovalRequired { fields });
            }
        }

        let previous_status = session.status;
        let transition = self
            .machine
            .apply(&mut records.session, request.kind.trigger(), now)?;

        let session = &mut records.session;
        request.settings.apply_to(session);
        session.intervention_count += 1;

        let mut resolved_events: Vec<EventId> = Vec::new();
        if request.kind == InterventionKind::Allow {
            for event in records.events.iter_mut() {
                if event.resolve(
                    ResolutionKind::GuardianCleared,
                    Some(request.actor_id.clone()),
                    now,
                ) {
                    resolved_events.push(event.id.clone());
                }
            }
        }

        let action = InterventionAction {
            id: action_id,
            session_id: session.id.clone(),
            guardian_id: request.actor_id.clone(),
            kind: request.kind,
            message: request.message.clone(),
            timestamp: now,
            previous_status,
            resulting_status: session.status,
            settings: request.settings.clone(),
            resolved_events,
        };

        info!(
            session_id = %session.id,
            action_id = %action.id,
            action = %action.kind,
            from = %action.previous_status,
            to = %action.resulting_status,
            "Intervention applied"
        );

        Ok(AppliedIntervention { action, transition })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::analyzer::{Severity, SuspicionEvent, SuspicionScore};
    use crate::config::{EngineConfig, SessionDefaults};
    use crate::intervention::SettingsChange;
    use crate::session::{LearningSession, SessionStatus, StartSession};
    use crate::types::InteractionId;

    fn coordinator() -> InterventionCoordinator {
        let config = EngineConfig::default();
        InterventionCoordinator::new(SessionStateMachine::new(&config), &config.interventions)
    }

    fn records(status: SessionStatus, approval: bool) -> SessionRecords {
        let mut session = LearningSession::new(
            &StartSession::new("kid", "fam").with_parent_approval(approval),
            &SessionDefaults::default(),
            Utc::now(),
        );
        session.status = status;
        SessionRecords {
            session,
            interactions: Vec::new(),
            events: Vec::new(),
            actions: Vec::new(),
        }
    }

    fn request(records: &SessionRecords, kind: InterventionKind) -> InterventionRequest {
        InterventionRequest::new(records.session.id.clone(), "mum", kind)
    }

    // ==================== Action Id Tests ====================

    #[test]
    fn identical_requests_in_one_bucket_share_an_id() {
        let coordinator = coordinator();
        let records = records(SessionStatus::Active, false);
        let now = Utc::now();
        let req = request(&records, InterventionKind::Pause).issued_at(now);

        assert_eq!(coordinator.action_id(&req, now), coordinator.action_id(&req, now));

        let other_message = req.clone().with_message("bed time");
        assert_ne!(
            coordinator.action_id(&req, now),
            coordinator.action_id(&other_message, now)
        );

        let later = req.clone().issued_at(now + Duration::seconds(60));
        assert_ne!(coordinator.action_id(&req, now), coordinator.action_id(&later, now));
    }

    #[test]
    fn different_settings_in_one_bucket_get_distinct_ids() {
        let coordinator = coordinator();
        let records = records(SessionStatus::Paused, false);
        let now = Utc::now();
        let redirect = |topic: &str| {
            request(&records, InterventionKind::Redirect)
                .with_settings(SettingsChange {
                    topic: Some(topic.to_string()),
                    ..Default::default()
                })
                .issued_at(now)
        };

        let fractions = redirect("fractions");
        assert_eq!(
            coordinator.action_id(&fractions, now),
            coordinator.action_id(&redirect("fractions"), now)
        );
        assert_ne!(
            coordinator.action_id(&fractions, now),
            coordinator.action_id(&redirect("algebra"), now)
        );
        assert_ne!(
            coordinator.action_id(&fractions, now),
            coordinator.action_id(&fractions.clone().approved(), now)
        );
    }

    #[test]
    fn request_id_takes_precedence() {
        let coordinator = coordinator();
        let records = records(SessionStatus::Active, false);
        let now = Utc::now();
        let a = request(&records, InterventionKind::Pause).with_request_id("r-1");
        let b = request(&records, InterventionKind::Pause)
            .with_request_id("r-1")
            .issued_at(now + Duration::hours(1));
        assert_eq!(coordinator.action_id(&a, now), coordinator.action_id(&b, now));
    }

    // ==================== Apply Tests ====================

    #[test]
    fn pause_records_previous_and_resulting_status() {
        let coordinator = coordinator();
        let mut records = records(SessionStatus::Monitored, false);
        let req = request(&records, InterventionKind::Pause);
        let id = coordinator.action_id(&req, Utc::now());

        let applied = coordinator.apply(&mut records, &req, id, Utc::now()).unwrap();

        assert_eq!(applied.action.previous_status, SessionStatus::Monitored);
        assert_eq!(applied.action.resulting_status, SessionStatus::Paused);
        assert_eq!(records.session.intervention_count, 1);
    }

    #[test]
    fn protected_change_without_approval_is_refused() {
        let coordinator = coordinator();
        let mut records = records(SessionStatus::Learning, true);
        let before = records.session.clone();
        let req = request(&records, InterventionKind::Block).with_settings(SettingsChange {
            ai_enabled: Some(false),
            ..Default::default()
        });
        let id = coordinator.action_id(&req, Utc::now());

        let err = coordinator.apply(&mut records, &req, id, Utc::now()).unwrap_err();

        assert!(matches!(err, EngineError::ApprovalRequired { ref fields } if fields == &["ai_enabled"]));
        assert_eq!(records.session, before);
    }

    #[test]
    fn approved_protected_change_is_applied() {
        let coordinator = coordinator();
        let mut records = records(SessionStatus::Learning, true);
        let req = request(&records, InterventionKind::Pause)
            .with_settings(SettingsChange {
                difficulty: Some(3),
                ..Default::default()
            })
            .approved();
        let id = coordinator.action_id(&req, Utc::now());

        coordinator.apply(&mut records, &req, id, Utc::now()).unwrap();

        assert_eq!(records.session.difficulty, 3);
        assert_eq!(records.session.status, SessionStatus::Paused);
    }

    #[test]
    fn invalid_transition_leaves_records_untouched() {
        let coordinator = coordinator();
        let mut records = records(SessionStatus::Blocked, false);
        let before = records.session.clone();
        let req = request(&records, InterventionKind::Block);
        let id = coordinator.action_id(&req, Utc::now());

        let err = coordinator.apply(&mut records, &req, id, Utc::now()).unwrap_err();

        assert!(matches!(err, EngineError::InvalidStateTransition { .. }));
        assert_eq!(records.session, before);
    }

    #[test]
    fn allow_resolves_open_events_as_guardian_cleared() {
        let coordinator = coordinator();
        let mut records = records(SessionStatus::Monitored, false);
        let score = SuspicionScore {
            score: 0.72,
            confidence: 1.0,
            signals: vec!["focus_loss".to_string()],
            contributions: Vec::new(),
        };
        records.events.push(SuspicionEvent::new(
            records.session.id.clone(),
            InteractionId::new("i"),
            &score,
            Severity::Low,
            Utc::now(),
        ));
        let req = request(&records, InterventionKind::Allow);
        let id = coordinator.action_id(&req, Utc::now());

        let applied = coordinator.apply(&mut records, &req, id, Utc::now()).unwrap();

        assert_eq!(records.session.status, SessionStatus::Active);
        assert_eq!(applied.action.resolved_events.len(), 1);
        let resolution = records.events[0].resolution.as_ref().unwrap();
        assert_eq!(resolution.kind, ResolutionKind::GuardianCleared);
        assert_eq!(resolution.by.as_ref().map(|a| a.as_str()), Some("mum"));
    }

    #[test]
    fn redirect_reassigns_topic() {
        let coordinator = coordinator();
        let mut records = records(SessionStatus::Paused, true);
        let req = request(&records, InterventionKind::Redirect).with_settings(SettingsChange {
            topic: Some("times tables".to_string()),
            ..Default::default()
        });
        let id = coordinator.action_id(&req, Utc::now());

        coordinator.apply(&mut records, &req, id, Utc::now()).unwrap();

        assert_eq!(records.session.status, SessionStatus::Active);
        assert_eq!(records.session.current_topic.as_deref(), Some("times tables"));
    }
}
