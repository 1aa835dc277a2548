//! Storage traits for session records

use async_trait::async_trait;

use crate::analyzer::SuspicionEvent;
use crate::error::StoreError;
use crate::interaction::Interaction;
use crate::intervention::InterventionAction;
use crate::notifications::FamilyNotification;
use crate::session::LearningSession;
use crate::types::{ActionId, ActorId, FamilyId, SessionId};

/// Everything written by one committed session mutation
#[derive(Debug, Clone)]
pub struct SessionCommit {
    pub session: LearningSession,
    pub interactions: Vec<Interaction>,
    pub new_events: Vec<SuspicionEvent>,
    /// Existing events whose resolution changed.
    pub resolved_events: Vec<SuspicionEvent>,
    pub actions: Vec<InterventionAction>,
}

impl SessionCommit {
    pub fn session_only(session: LearningSession) -> Self {
        Self {
            session,
            interactions: Vec::new(),
            new_events: Vec::new(),
            resolved_events: Vec::new(),
            actions: Vec::new(),
        }
    }
}

/// A session and its logs as of one committed version
#[derive(Debug, Clone)]
pub struct SessionRecords {
    pub session: LearningSession,
    /// In sequence order.
    pub interactions: Vec<Interaction>,
    /// In creation order.
    pub events: Vec<SuspicionEvent>,
    pub actions: Vec<InterventionAction>,
}

impl SessionRecords {
    pub fn open_events(&self) -> impl Iterator<Item = &SuspicionEvent> {
        self.events.iter().filter(|e| !e.is_resolved())
    }
}

/// CRUD on the engine's records, keyed by opaque ids
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session; fails with `Conflict` if the id exists
    async fn insert_session(&self, session: &LearningSession) -> Result<(), StoreError>;

    async fn get_session(&self, id: &SessionId) -> Result<Option<LearningSession>, StoreError>;

    /// Sessions owned by a student, oldest first
    async fn sessions_for_student(
        &self,
        student_id: &ActorId,
    ) -> Result<Vec<LearningSession>, StoreError>;

    /// Replace a session; fails with `Conflict` unless the version moved forward
    async fn update_session(&self, session: &LearningSession) -> Result<(), StoreError>;

    /// Append an interaction; its sequence number must be the next one
    async fn append_interaction(&self, interaction: &Interaction) -> Result<(), StoreError>;

    async fn interactions(&self, session_id: &SessionId) -> Result<Vec<Interaction>, StoreError>;

    async fn insert_event(&self, event: &SuspicionEvent) -> Result<(), StoreError>;

    async fn update_event(&self, event: &SuspicionEvent) -> Result<(), StoreError>;

    async fn events(&self, session_id: &SessionId) -> Result<Vec<SuspicionEvent>, StoreError>;

    async fn insert_action(&self, action: &InterventionAction) -> Result<(), StoreError>;

    async fn get_action(&self, id: &ActionId) -> Result<Option<InterventionAction>, StoreError>;

    async fn actions(&self, session_id: &SessionId) -> Result<Vec<InterventionAction>, StoreError>;

    /// Insert or replace a notification by id
    async fn upsert_notification(&self, notification: &FamilyNotification)
    -> Result<(), StoreError>;

    /// Notifications for a family, oldest first
    async fn notifications_for(
        &self,
        family_id: &FamilyId,
    ) -> Result<Vec<FamilyNotification>, StoreError>;

    /// Write one mutation
    ///
    /// Logs are written before the session record, so a reader that filters
    /// by the session's counters never sees a partial mutation. Stores that
    /// can write atomically should override this.
    async fn commit(&self, commit: SessionCommit) -> Result<(), StoreError> {
        for interaction in &commit.interactions {
            self.append_interaction(interaction).await?;
        }
        for event in &commit.new_events {
            self.insert_event(event).await?;
        }
        for event in &commit.resolved_events {
            self.update_event(event).await?;
        }
        for action in &commit.actions {
            self.insert_action(action).await?;
        }
        self.update_session(&commit.session).await
    }

    /// Read a session and its logs as of the session's committed version
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecords>, StoreError> {
        let Some(session) = self.get_session(id).await? else {
            return Ok(None);
        };
        let mut interactions = self.interactions(id).await?;
        interactions.retain(|i| i.seq < session.interaction_count);
        let mut events = self.events(id).await?;
        events.retain(|e| interactions.iter().any(|i| i.id == e.interaction_id));
        let mut actions = self.actions(id).await?;
        actions.retain(|a| a.timestamp <= session.updated_at);
        Ok(Some(SessionRecords {
            session,
            interactions,
            events,
            actions,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify traits are object-safe
    #[test]
    fn test_session_store_is_object_safe() {
        fn _takes_boxed(_: Box<dyn SessionStore>) {}
    }
}
