//! Progress and engagement metrics

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::achievements::{self, Achievement, is_violation};
use crate::config::{AnalyticsConfig, EngineConfig};
use crate::interaction::{Interaction, InteractionKind, ReplySource};
use crate::session::{LearningSession, SessionStatus};
use crate::store::SessionRecords;
use crate::types::{ActorId, SessionId};

/// Whose analytics to compute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AnalyticsTarget {
    Session(SessionId),
    Student(ActorId),
}

/// Window of interactions included in a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Day,
    Week,
    Month,
    #[default]
    All,
}

impl Timeframe {
    /// Start of the window, `None` for everything
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timeframe::Day => Some(now - Duration::days(1)),
            Timeframe::Week => Some(now - Duration::days(7)),
            Timeframe::Month => Some(now - Duration::days(30)),
            Timeframe::All => None,
        }
    }
}

/// Derived metrics for a session or a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub target: AnalyticsTarget,
    pub timeframe: Timeframe,
    pub sessions: usize,
    pub interactions: usize,
    pub ai_interactions: usize,
    pub hint_requests: usize,
    pub learning_time_secs: i64,
    /// Consecutive learning days ending today or yesterday.
    pub current_streak_days: u32,
    pub longest_streak_days: u32,
    /// Correct over graded answers.
    pub completion_rate: f64,
    /// Violating over all interactions.
    pub violation_rate: f64,
    pub progress_score: f64,
    pub suspicion_events: usize,
    pub open_suspicion_events: usize,
    pub interventions: usize,
    pub achievements: Vec<Achievement>,
}

/// Computes analytics as pure functions of the log
#[derive(Debug, Clone)]
pub struct AnalyticsAggregator {
    config: AnalyticsConfig,
    threshold: f64,
}

impl AnalyticsAggregator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.analytics.clone(),
            threshold: config.suspicion.threshold,
        }
    }

    /// Sum of gaps between consecutive interactions, each capped at the
    /// idle limit
    pub fn learning_time_secs<'a>(&self, interactions: impl IntoIterator<Item = &'a Interaction>) -> i64 {
        let cap = self.config.max_idle_minutes.max(0) * 60;
        let mut stamps: Vec<DateTime<Utc>> = interactions.into_iter().map(|i| i.timestamp).collect();
        stamps.sort();
        stamps
            .windows(2)
            .map(|w| (w[1] - w[0]).num_seconds().clamp(0, cap))
            .sum()
    }

    /// Correct answers over graded ones, 0 when nothing was graded
    pub fn completion_rate<'a>(&self, interactions: impl IntoIterator<Item = &'a Interaction>) -> f64 {
        let (graded, correct) = interactions
            .into_iter()
            .filter(|i| i.is_graded())
            .fold((0u32, 0u32), |(g, c), i| (g + 1, c + u32::from(i.is_correct())));
        if graded == 0 {
            0.0
        } else {
            f64::from(correct) / f64::from(graded)
        }
    }

    pub fn violation_rate<'a>(&self, interactions: impl IntoIterator<Item = &'a Interaction>) -> f64 {
        let (total, violations) = interactions.into_iter().fold((0u32, 0u32), |(t, v), i| {
            (t + 1, v + u32::from(is_violation(i, self.threshold)))
        });
        if total == 0 {
            0.0
        } else {
            f64::from(violations) / f64::from(total)
        }
    }

    /// Current and longest run of consecutive learning days
    ///
    /// A learning day has at least one interaction that left the session
    /// LEARNING. The current run ends on the latest such day and lapses once
    /// that day is before yesterday.
    pub fn streaks<'a>(
        &self,
        interactions: impl IntoIterator<Item = &'a Interaction>,
        now: DateTime<Utc>,
    ) -> (u32, u32) {
        let days: BTreeSet<NaiveDate> = interactions
            .into_iter()
            .filter(|i| i.status_after == SessionStatus::Learning)
            .map(|i| i.timestamp.date_naive())
            .collect();

        let mut longest = 0u32;
        let mut run = 0u32;
        let mut previous: Option<NaiveDate> = None;
        for day in days {
            run = match previous {
                Some(p) if p.succ_opt() == Some(day) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            previous = Some(day);
        }

        let yesterday = now.date_naive().pred_opt();
        let current = match (previous, yesterday) {
            (Some(last), Some(yesterday)) if last < yesterday => 0,
            _ => run,
        };
        (current, longest)
    }

    /// Weighted progress in [0, 1]
    ///
    /// Blends completion, streak towards the target and the safety record.
    /// An empty log has no progress.
    pub fn progress_score(&self, interactions: &[&Interaction], streak_days: u32) -> f64 {
        if interactions.is_empty() {
            return 0.0;
        }
        let c = &self.config;
        let weight_sum = c.completion_weight + c.streak_weight + c.safety_weight;
        if weight_sum <= 0.0 {
            return 0.0;
        }
        let streak = if c.streak_target_days == 0 {
            1.0
        } else {
            (f64::from(streak_days) / f64::from(c.streak_target_days)).min(1.0)
        };
        let completion = self.completion_rate(interactions.iter().copied());
        let safety = 1.0 - self.violation_rate(interactions.iter().copied());

        ((c.completion_weight * completion + c.streak_weight * streak + c.safety_weight * safety)
            / weight_sum)
            .clamp(0.0, 1.0)
    }

    /// Recompute the session's derived fields from its log
    ///
    /// `history` is every interaction of the student, this session included;
    /// streaks span sessions and are measured against `now`.
    pub fn refresh(
        &self,
        session: &mut LearningSession,
        interactions: &[Interaction],
        history: &[&Interaction],
        now: DateTime<Utc>,
    ) {
        let (current, _) = self.streaks(history.iter().copied(), now);
        let own: Vec<&Interaction> = interactions.iter().collect();
        session.learning_time_secs = self.learning_time_secs(interactions);
        session.streak_days = current;
        session.progress_score = self.progress_score(&own, current);
    }

    /// Aggregate a snapshot for `target`
    ///
    /// `history` holds every session of the student oldest first. Streaks and
    /// achievements look at the whole history; the other metrics only at the
    /// target's interactions inside the timeframe.
    pub fn snapshot(
        &self,
        target: AnalyticsTarget,
        timeframe: Timeframe,
        history: &[SessionRecords],
        now: DateTime<Utc>,
    ) -> AnalyticsSnapshot {
        let since = timeframe.since(now);
        let in_window = |ts: DateTime<Utc>| since.is_none_or(|s| ts >= s);

        let selected: Vec<&SessionRecords> = history
            .iter()
            .filter(|r| match &target {
                AnalyticsTarget::Session(id) => &r.session.id == id,
                AnalyticsTarget::Student(id) => &r.session.student_id == id,
            })
            .collect();

        let interactions: Vec<&Interaction> = selected
            .iter()
            .flat_map(|r| r.interactions.iter())
            .filter(|i| in_window(i.timestamp))
            .collect();

        let all: Vec<&Interaction> = history.iter().flat_map(|r| r.interactions.iter()).collect();
        let (current, longest) = self.streaks(all.iter().copied(), now);

        let logs: Vec<&[Interaction]> = history.iter().map(|r| r.interactions.as_slice()).collect();
        let achievements = achievements::evaluate(&logs, self.threshold)
            .into_iter()
            .filter(|a| in_window(a.earned_at))
            .filter(|a| match &target {
                AnalyticsTarget::Session(id) => &a.session_id == id,
                AnalyticsTarget::Student(_) => true,
            })
            .collect();

        let events = selected
            .iter()
            .flat_map(|r| r.events.iter())
            .filter(|e| in_window(e.created_at));

        AnalyticsSnapshot {
            sessions: selected.len(),
            interactions: interactions.len(),
            ai_interactions: interactions.iter().filter(|i| i.reply.source == ReplySource::Tutor).count(),
            hint_requests: interactions
                .iter()
                .filter(|i| i.kind == InteractionKind::HintRequest)
                .count(),
            learning_time_secs: selected
                .iter()
                .map(|r| {
                    self.learning_time_secs(r.interactions.iter().filter(|i| in_window(i.timestamp)))
                })
                .sum(),
            current_streak_days: current,
            longest_streak_days: longest,
            completion_rate: self.completion_rate(interactions.iter().copied()),
            violation_rate: self.violation_rate(interactions.iter().copied()),
            progress_score: self.progress_score(&interactions, current),
            suspicion_events: events.clone().count(),
            open_suspicion_events: events.filter(|e| !e.is_resolved()).count(),
            interventions: selected
                .iter()
                .flat_map(|r| r.actions.iter())
                .filter(|a| in_window(a.timestamp))
                .count(),
            achievements,
            target,
            timeframe,
        }
    }
}
