//! In-memory store for tests and offline runs
//!
//! All records live behind one lock, so `commit` and `load` are atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::traits::{SessionCommit, SessionRecords, SessionStore};
use crate::analyzer::SuspicionEvent;
use crate::error::StoreError;
use crate::interaction::Interaction;
use crate::intervention::InterventionAction;
use crate::notifications::FamilyNotification;
use crate::session::LearningSession;
use crate::types::{ActionId, ActorId, FamilyId, SessionId};

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<SessionId, LearningSession>,
    /// Session ids in insertion order.
    session_order: Vec<SessionId>,
    interactions: HashMap<SessionId, Vec<Interaction>>,
    events: HashMap<SessionId, Vec<SuspicionEvent>>,
    actions: HashMap<SessionId, Vec<InterventionAction>>,
    notifications: Vec<FamilyNotification>,
}

impl MemoryState {
    fn check_version(&self, session: &LearningSession) -> Result<(), StoreError> {
        let stored = self
            .sessions
            .get(&session.id)
            .ok_or_else(|| not_found("Session", session.id.as_str()))?;
        if session.version <= stored.version {
            return Err(StoreError::Conflict(format!(
                "session {} version {} is not newer than stored version {}",
                session.id, session.version, stored.version
            )));
        }
        Ok(())
    }

    fn check_append(&self, interaction: &Interaction) -> Result<(), StoreError> {
        let next = self
            .interactions
            .get(&interaction.session_id)
            .map_or(0, Vec::len);
        if interaction.seq as usize != next {
            return Err(StoreError::Conflict(format!(
                "interaction seq {} out of order, expected {}",
                interaction.seq, next
            )));
        }
        Ok(())
    }

    fn replace_event(&mut self, event: &SuspicionEvent) -> Result<(), StoreError> {
        let slot = self
            .events
            .get_mut(&event.session_id)
            .and_then(|events| events.iter_mut().find(|e| e.id == event.id))
            .ok_or_else(|| not_found("SuspicionEvent", event.id.as_str()))?;
        *slot = event.clone();
        Ok(())
    }

    fn push_action(&mut self, action: &InterventionAction) -> Result<(), StoreError> {
        let actions = self.actions.entry(action.session_id.clone()).or_default();
        if actions.iter().any(|a| a.id == action.id) {
            return Err(StoreError::Conflict(format!(
                "intervention action {} already recorded",
                action.id
            )));
        }
        actions.push(action.clone());
        Ok(())
    }
}

fn not_found(kind: &'static str, id: &str) -> StoreError {
    StoreError::NotFound {
        kind,
        id: id.to_string(),
    }
}

/// In-memory implementation of SessionStore
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: &LearningSession) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict(format!(
                "session {} already exists",
                session.id
            )));
        }
        state.session_order.push(session.id.clone());
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<LearningSession>, StoreError> {
        Ok(self.state.read().await.sessions.get(id).cloned())
    }

    async fn sessions_for_student(
        &self,
        student_id: &ActorId,
    ) -> Result<Vec<LearningSession>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .session_order
            .iter()
            .filter_map(|id| state.sessions.get(id))
            .filter(|s| &s.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn update_session(&self, session: &LearningSession) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check_version(session)?;
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn append_interaction(&self, interaction: &Interaction) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check_append(interaction)?;
        state
            .interactions
            .entry(interaction.session_id.clone())
            .or_default()
            .push(interaction.clone());
        Ok(())
    }

    async fn interactions(&self, session_id: &SessionId) -> Result<Vec<Interaction>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .interactions
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_event(&self, event: &SuspicionEvent) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .events
            .entry(event.session_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn update_event(&self, event: &SuspicionEvent) -> Result<(), StoreError> {
        self.state.write().await.replace_event(event)
    }

    async fn events(&self, session_id: &SessionId) -> Result<Vec<SuspicionEvent>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .events
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_action(&self, action: &InterventionAction) -> Result<(), StoreError> {
        self.state.write().await.push_action(action)
    }

    async fn get_action(&self, id: &ActionId) -> Result<Option<InterventionAction>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .actions
            .values()
            .flatten()
            .find(|a| &a.id == id)
            .cloned())
    }

    async fn actions(&self, session_id: &SessionId) -> Result<Vec<InterventionAction>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .actions
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_notification(
        &self,
        notification: &FamilyNotification,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification.id)
        {
            Some(existing) => *existing = notification.clone(),
            None => state.notifications.push(notification.clone()),
        }
        Ok(())
    }

    async fn notifications_for(
        &self,
        family_id: &FamilyId,
    ) -> Result<Vec<FamilyNotification>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| &n.family_id == family_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, commit: SessionCommit) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        // validate everything before writing anything
        state.check_version(&commit.session)?;
        let mut next = state
            .interactions
            .get(&commit.session.id)
            .map_or(0, Vec::len);
        for interaction in &commit.interactions {
            if interaction.seq as usize != next {
                return Err(StoreError::Conflict(format!(
                    "interaction seq {} out of order, expected {}",
                    interaction.seq, next
                )));
            }
            next += 1;
        }
        for event in &commit.resolved_events {
            let known = state
                .events
                .get(&event.session_id)
                .is_some_and(|events| events.iter().any(|e| e.id == event.id));
            if !known {
                return Err(not_found("SuspicionEvent", event.id.as_str()));
            }
        }
        let existing = state.actions.get(&commit.session.id);
        if let Some(dup) = commit
            .actions
            .iter()
            .find(|a| existing.is_some_and(|actions| actions.iter().any(|e| e.id == a.id)))
        {
            return Err(StoreError::Conflict(format!(
                "intervention action {} already recorded",
                dup.id
            )));
        }

        let session_id = commit.session.id.clone();
        state
            .interactions
            .entry(session_id.clone())
            .or_default()
            .extend(commit.interactions);
        state
            .events
            .entry(session_id.clone())
            .or_default()
            .extend(commit.new_events);
        for event in &commit.resolved_events {
            state.replace_event(event)?;
        }
        state
            .actions
            .entry(session_id.clone())
            .or_default()
            .extend(commit.actions);
        state.sessions.insert(session_id, commit.session);
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecords>, StoreError> {
        let state = self.state.read().await;
        let Some(session) = state.sessions.get(id) else {
            return Ok(None);
        };
        Ok(Some(SessionRecords {
            session: session.clone(),
            interactions: state.interactions.get(id).cloned().unwrap_or_default(),
            events: state.events.get(id).cloned().unwrap_or_default(),
            actions: state.actions.get(id).cloned().unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::SessionDefaults;
    use crate::interaction::{InteractionKind, TutorReply};
    use crate::session::{SessionStatus, StartSession};
    use crate::types::InteractionId;

    fn session(student: &str) -> LearningSession {
        LearningSession::new(
            &StartSession::new(student, "fam"),
            &SessionDefaults::default(),
            Utc::now(),
        )
    }

    fn interaction(session: &LearningSession, seq: u32) -> Interaction {
        Interaction {
            id: InteractionId::generate(),
            session_id: session.id.clone(),
            seq,
            kind: InteractionKind::Question,
            direct_answer_request: false,
            message: "why?".to_string(),
            timestamp: Utc::now(),
            reply: TutorReply::tutor("why do you think?"),
            suspicion_score: 0.0,
            signals: Vec::new(),
            pedagogy_enforced: false,
            outcome: None,
            status_after: SessionStatus::Learning,
        }
    }

    // ==================== Session Tests ====================

    #[tokio::test]
    async fn insert_and_get_session() {
        let store = MemoryStore::new();
        let session = session("kid");
        store.insert_session(&session).await.unwrap();

        let loaded = store.get_session(&session.id).await.unwrap();
        assert_eq!(loaded, Some(session));
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_session_conflicts() {
        let store = MemoryStore::new();
        let session = session("kid");
        store.insert_session(&session).await.unwrap();
        let err = store.insert_session(&session).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let store = MemoryStore::new();
        let mut session = session("kid");
        store.insert_session(&session).await.unwrap();

        let stale = session.clone();
        session.touch(Utc::now());
        store.update_session(&session).await.unwrap();

        let err = store.update_session(&stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn sessions_for_student_filters_and_orders() {
        let store = MemoryStore::new();
        let first = session("kid");
        let other = session("sibling");
        let second = session("kid");
        for s in [&first, &other, &second] {
            store.insert_session(s).await.unwrap();
        }

        let found = store
            .sessions_for_student(&ActorId::new("kid"))
            .await
            .unwrap();
        assert_eq!(
            found.iter().map(|s| s.id.clone()).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
    }

    // ==================== Interaction Tests ====================

    #[tokio::test]
    async fn interactions_append_in_sequence() {
        let store = MemoryStore::new();
        let session = session("kid");
        store.insert_session(&session).await.unwrap();

        store.append_interaction(&interaction(&session, 0)).await.unwrap();
        let err = store
            .append_interaction(&interaction(&session, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.interactions(&session.id).await.unwrap().len(), 1);
    }

    // ==================== Commit Tests ====================

    #[tokio::test]
    async fn commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        let mut session = session("kid");
        store.insert_session(&session).await.unwrap();
        session.touch(Utc::now());

        let mut bad = SessionCommit::session_only(session.clone());
        bad.interactions = vec![interaction(&session, 0), interaction(&session, 5)];
        assert!(store.commit(bad).await.is_err());
        assert!(store.interactions(&session.id).await.unwrap().is_empty());

        let mut good = SessionCommit::session_only(session.clone());
        good.interactions = vec![interaction(&session, 0)];
        store.commit(good).await.unwrap();

        let records = store.load(&session.id).await.unwrap().unwrap();
        assert_eq!(records.interactions.len(), 1);
        assert_eq!(records.session.version, session.version);
    }

    #[tokio::test]
    async fn load_missing_session_is_none() {
        let store = MemoryStore::new();
        assert!(store.load(&SessionId::new("nope")).await.unwrap().is_none());
    }
}
