//! Suspicion events and severity tiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SuspicionScore;
use crate::config::SuspicionConfig;
use crate::types::{ActorId, EventId, InteractionId, SessionId};

/// Severity tier of a suspicion event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Tier for a score that already met the event threshold
    pub fn from_score(score: f64, config: &SuspicionConfig) -> Self {
        if score >= config.high_cutoff {
            Severity::High
        } else if score >= config.medium_cutoff {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Suggested guardian response, shown in notifications
    pub fn recommended_action(self) -> &'static str {
        match self {
            Severity::High => "Session suspended. Review the activity with your child.",
            Severity::Medium => "Increased monitoring. Consider checking in on the session.",
            Severity::Low => "Logged for review. No action needed yet.",
        }
    }
}

/// How an event was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// A guardian cleared monitoring
    GuardianCleared,
    /// The score decayed below the resolve floor
    Decayed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub kind: ResolutionKind,
    pub at: DateTime<Utc>,
    pub by: Option<ActorId>,
}

/// A scored interaction that met the suspicion threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionEvent {
    pub id: EventId,
    pub session_id: SessionId,
    pub interaction_id: InteractionId,
    /// Triggering signal names, strongest first.
    pub signals: Vec<String>,
    pub score: f64,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    pub resolution: Option<Resolution>,
}

impl SuspicionEvent {
    pub fn new(
        session_id: SessionId,
        interaction_id: InteractionId,
        score: &SuspicionScore,
        severity: Severity,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            session_id,
            interaction_id,
            signals: score.signals.clone(),
            score: score.score,
            severity,
            created_at: now,
            resolution: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Resolve the event
    ///
    /// Returns false, leaving the event untouched, if it was already resolved.
    pub fn resolve(&mut self, kind: ResolutionKind, by: Option<ActorId>, at: DateTime<Utc>) -> bool {
        if self.is_resolved() {
            return false;
        }
        self.resolution = Some(Resolution { kind, at, by });
        true
    }

    /// Score after geometric decay since the last violation
    pub fn decayed_score(
        &self,
        last_violation_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        half_life_minutes: f64,
    ) -> f64 {
        let since = last_violation_at
            .map_or(self.created_at, |t| t.max(self.created_at));
        super::decay(self.score, now - since, half_life_minutes)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn event(score: f64) -> SuspicionEvent {
        let score = SuspicionScore {
            score,
            confidence: 1.0,
            signals: vec!["clipboard_paste".to_string()],
            contributions: Vec::new(),
        };
        SuspicionEvent::new(
            SessionId::new("s"),
            InteractionId::new("i"),
            &score,
            Severity::Low,
            Utc::now(),
        )
    }

    #[test]
    fn severity_tiers_follow_cutoffs() {
        let config = SuspicionConfig::default();
        assert_eq!(Severity::from_score(0.7, &config), Severity::Low);
        assert_eq!(Severity::from_score(0.76, &config), Severity::Medium);
        assert_eq!(Severity::from_score(0.85, &config), Severity::High);
    }

    #[test]
    fn resolves_at_most_once() {
        let mut event = event(0.8);
        let now = Utc::now();
        assert!(event.resolve(ResolutionKind::Decayed, None, now));
        assert!(!event.resolve(
            ResolutionKind::GuardianCleared,
            Some(ActorId::new("parent")),
            now
        ));
        assert_eq!(
            event.resolution.as_ref().map(|r| r.kind),
            Some(ResolutionKind::Decayed)
        );
    }

    #[test]
    fn score_halves_after_one_half_life() {
        let event = event(0.8);
        let later = event.created_at + Duration::minutes(30);
        let decayed = event.decayed_score(None, later, 30.0);
        assert!((decayed - 0.4).abs() < 1e-9);
    }

    #[test]
    fn new_violation_restarts_decay_clock() {
        let event = event(0.8);
        let violation = event.created_at + Duration::minutes(30);
        let decayed = event.decayed_score(Some(violation), violation, 30.0);
        assert!((decayed - 0.8).abs() < 1e-9);
    }
}
