//! Guardian intervention flow

use chrono::Utc;
use tracing::debug;

use super::SessionEngine;
use crate::error::EngineError;
use crate::identity::Role;
use crate::intervention::{InterventionRequest, InterventionResult};
use crate::notifications::FamilyNotification;
use crate::session::LearningSession;
use crate::session::machine::cancels_tutoring;
use crate::store::SessionCommit;
use crate::types::ActorId;
use crate::validation;

impl SessionEngine {
    /// Apply a guardian action to a session
    ///
    /// A request that maps to an already applied action returns that action
    /// with `replayed` set and changes nothing.
    pub async fn apply_intervention(
        &self,
        request: InterventionRequest,
    ) -> Result<InterventionResult, EngineError> {
        validation::validate_intervention(&request, self.config.session.max_message_chars)?;
        let received_at = Utc::now();

        let mut guard = self.locks.acquire(&request.session_id).await?;
        let mut records = self.load(&request.session_id).await?;
        self.authorize_guardian(&request.actor_id, &records.session)
            .await?;

        let action_id = self.coordinator.action_id(&request, received_at);
        if let Some(action) = self.store.get_action(&action_id).await?
            && action.session_id == records.session.id
        {
            debug!(
                session_id = %records.session.id,
                action_id = %action.id,
                "Intervention already applied, replaying"
            );
            return Ok(InterventionResult {
                action,
                replayed: true,
            });
        }

        let applied = self
            .coordinator
            .apply(&mut records, &request, action_id, received_at)?;
        self.refresh_analytics(&mut records.session, &records.interactions, received_at)
            .await?;

        let resolved_events = records
            .events
            .iter()
            .filter(|e| applied.action.resolved_events.contains(&e.id))
            .cloned()
            .collect();
        self.store
            .commit(SessionCommit {
                session: records.session.clone(),
                interactions: Vec::new(),
                new_events: Vec::new(),
                resolved_events,
                actions: vec![applied.action.clone()],
            })
            .await?;

        if cancels_tutoring(&applied.transition) {
            guard.cancel_in_flight();
        }
        drop(guard);

        if applied.transition.from != applied.transition.to {
            self.notify(FamilyNotification::status_changed(
                &records.session,
                &applied.transition,
            ));
        }
        self.notify(FamilyNotification::intervention_applied(
            &records.session,
            &applied.action,
        ));

        Ok(InterventionResult {
            action: applied.action,
            replayed: false,
        })
    }

    async fn authorize_guardian(
        &self,
        actor: &ActorId,
        session: &LearningSession,
    ) -> Result<(), EngineError> {
        let role = self.roles.role_of(actor, &session.family_id).await?;
        if role != Role::Guardian {
            return Err(EngineError::PermissionDenied {
                actor: actor.clone(),
                reason: "only a guardian of the session's family may intervene".to_string(),
            });
        }
        Ok(())
    }
}
