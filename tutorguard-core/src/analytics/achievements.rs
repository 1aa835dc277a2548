//! Rule-based achievements

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::interaction::{Interaction, InteractionKind};
use crate::session::SessionStatus;
use crate::types::SessionId;

/// Interactions needed for the milestone achievement
pub const MILESTONE_INTERACTIONS: usize = 25;

/// Interactions a session needs before it can count as clean
pub const CLEAN_SESSION_MIN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    FirstQuestion,
    /// A correct answer with no hint requested earlier in the session
    FirstUnaidedCorrect,
    ThreeDayStreak,
    SevenDayStreak,
    TwentyFiveInteractions,
    /// A session of at least ten interactions without violations
    CleanSession,
}

impl AchievementKind {
    pub fn title(self) -> &'static str {
        match self {
            AchievementKind::FirstQuestion => "Curious Mind",
            AchievementKind::FirstUnaidedCorrect => "Figured It Out",
            AchievementKind::ThreeDayStreak => "Three in a Row",
            AchievementKind::SevenDayStreak => "Week Warrior",
            AchievementKind::TwentyFiveInteractions => "Regular Learner",
            AchievementKind::CleanSession => "Honest Effort",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub kind: AchievementKind,
    pub title: String,
    pub session_id: SessionId,
    /// Timestamp of the interaction that earned it.
    pub earned_at: DateTime<Utc>,
}

impl Achievement {
    fn new(kind: AchievementKind, interaction: &Interaction) -> Self {
        Self {
            kind,
            title: kind.title().to_string(),
            session_id: interaction.session_id.clone(),
            earned_at: interaction.timestamp,
        }
    }
}

/// Whether an interaction counts against the student
pub fn is_violation(interaction: &Interaction, threshold: f64) -> bool {
    interaction.pedagogy_enforced || interaction.suspicion_score >= threshold
}

/// Evaluate the catalogue over a student's history
///
/// `sessions` holds each session's interactions in sequence order; sessions
/// are given oldest first. Each achievement is earned at most once.
pub fn evaluate(sessions: &[&[Interaction]], threshold: f64) -> Vec<Achievement> {
    let mut earned: Vec<Achievement> = Vec::new();
    let has = |earned: &[Achievement], kind| earned.iter().any(|a| a.kind == kind);

    let mut all: Vec<&Interaction> = sessions.iter().flat_map(|s| s.iter()).collect();
    all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.seq.cmp(&b.seq)));

    if let Some(first) = all.iter().find(|i| i.kind == InteractionKind::Question) {
        earned.push(Achievement::new(AchievementKind::FirstQuestion, first));
    }

    let mut unaided: Option<&Interaction> = None;
    for session in sessions {
        let mut hinted = false;
        for interaction in session.iter() {
            if interaction.kind == InteractionKind::HintRequest {
                hinted = true;
            }
            if !hinted
                && interaction.is_correct()
                && unaided.is_none_or(|u| interaction.timestamp < u.timestamp)
            {
                unaided = Some(interaction);
                break;
            }
        }
    }
    if let Some(interaction) = unaided {
        earned.push(Achievement::new(AchievementKind::FirstUnaidedCorrect, interaction));
    }

    // walk learning days in order; the first interaction on the day a run
    // reaches the target earns the streak
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    let mut seen: BTreeSet<NaiveDate> = BTreeSet::new();
    for interaction in all.iter().filter(|i| i.status_after == SessionStatus::Learning) {
        let day = interaction.timestamp.date_naive();
        if !seen.insert(day) {
            continue;
        }
        run = match previous {
            Some(p) if p.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        previous = Some(day);
        if run >= 3 && !has(&earned, AchievementKind::ThreeDayStreak) {
            earned.push(Achievement::new(AchievementKind::ThreeDayStreak, interaction));
        }
        if run >= 7 && !has(&earned, AchievementKind::SevenDayStreak) {
            earned.push(Achievement::new(AchievementKind::SevenDayStreak, interaction));
        }
    }

    if let Some(milestone) = all.get(MILESTONE_INTERACTIONS - 1) {
        earned.push(Achievement::new(
            AchievementKind::TwentyFiveInteractions,
            milestone,
        ));
    }

    let clean = sessions
        .iter()
        .filter(|s| s.len() >= CLEAN_SESSION_MIN)
        .filter(|s| !s.iter().any(|i| is_violation(i, threshold)))
        .filter_map(|s| s.last())
        .min_by_key(|i| i.timestamp);
    if let Some(last) = clean {
        earned.push(Achievement::new(AchievementKind::CleanSession, last));
    }

    earned.sort_by(|a, b| a.earned_at.cmp(&b.earned_at).then(a.kind.cmp(&b.kind)));
    earned
}
