//! Suspicion analyzer for per-interaction misuse scoring.
//!
//! The `SuspicionAnalyzer` scores one interaction against a bounded window of
//! recent history. It is stateless: the same input and window always give the
//! same score, and creating a [`SuspicionEvent`] from the score is the state
//! machine's job.
//!
//! ```text
//! ScoringInput + window
//!     │
//!     ├─ input_velocity ─┐
//!     ├─ paste_burst     │
//!     ├─ correctness_jump├─ weighted sum × monitoring multiplier ─► SuspicionScore
//!     ├─ off_hours       │
//!     ├─ solution_request│
//!     ├─ vocabulary_shift│
//!     └─ device flags ───┘
//! ```

pub mod event;
pub mod signals;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

pub use event::{Resolution, ResolutionKind, Severity, SuspicionEvent};
pub use signals::{ContentHits, DeviceSignals, ScoringInput, TextProfile};

use crate::config::SuspicionConfig;
use crate::interaction::Interaction;
use crate::types::MonitoringLevel;

/// Contribution of one signal to a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContribution {
    pub name: String,
    /// Signal value in [0, 1].
    pub value: f64,
    pub weight: f64,
}

impl SignalContribution {
    pub fn weighted(&self) -> f64 {
        self.value * self.weight
    }
}

/// Result of scoring one interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionScore {
    /// Normalized score in [0, 1].
    pub score: f64,
    /// Share of configured weight whose inputs were available.
    pub confidence: f64,
    /// Signals that contributed, strongest first.
    pub signals: Vec<String>,
    pub contributions: Vec<SignalContribution>,
}

impl SuspicionScore {
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

/// Scores interactions for misuse signals.
#[derive(Debug, Clone)]
pub struct SuspicionAnalyzer {
    config: SuspicionConfig,
}

impl SuspicionAnalyzer {
    pub fn new(config: SuspicionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SuspicionConfig {
        &self.config
    }

    /// Select the recent-history window for an interaction at `now`.
    ///
    /// Keeps at most `window_size` of the latest interactions that are also
    /// younger than `window_minutes`.
    pub fn window<'a>(&self, history: &'a [Interaction], now: DateTime<Utc>) -> &'a [Interaction] {
        let start = history.len().saturating_sub(self.config.window_size);
        let recent = &history[start..];
        let cutoff = now - Duration::minutes(self.config.window_minutes);
        let first_inside = recent
            .iter()
            .position(|i| i.timestamp >= cutoff)
            .unwrap_or(recent.len());
        &recent[first_inside..]
    }

    /// Score an interaction against its history.
    ///
    /// `history` is the session's interactions in recording order; the window
    /// is selected here.
    pub fn analyze(
        &self,
        input: &ScoringInput<'_>,
        history: &[Interaction],
        level: MonitoringLevel,
    ) -> SuspicionScore {
        let window = self.window(history, input.timestamp);
        let weights = &self.config.weights;

        let values = [
            signals::input_velocity(input, window, &self.config),
            signals::paste_burst(input, &self.config),
            signals::correctness_jump(input, window, &self.config),
            signals::off_hours(input, &self.config),
            signals::flag(input.device.clipboard_paste),
            signals::flag(input.device.focus_loss),
            signals::flag(input.device.external_ai_site),
            signals::solution_request(input),
            signals::vocabulary_shift(input, window, &self.config),
        ];

        let mut total_weight = 0.0;
        let mut available_weight = 0.0;
        let mut contributions = Vec::new();
        for ((name, weight), value) in weights.as_array().into_iter().zip(values) {
            total_weight += weight;
            if let Some(value) = value {
                available_weight += weight;
                contributions.push(SignalContribution {
                    name: name.to_string(),
                    value,
                    weight,
                });
            }
        }

        let raw: f64 = contributions.iter().map(SignalContribution::weighted).sum();
        let score = (raw * level.score_multiplier()).clamp(0.0, 1.0);
        let confidence = if total_weight > 0.0 {
            available_weight / total_weight
        } else {
            1.0
        };

        let mut firing: Vec<_> = contributions
            .iter()
            .filter(|c| c.weighted() > 0.0)
            .collect();
        firing.sort_by(|a, b| b.weighted().total_cmp(&a.weighted()));
        let signals = firing.into_iter().map(|c| c.name.clone()).collect();

        trace!(
            score,
            confidence,
            window = window.len(),
            "SuspicionAnalyzer scored interaction"
        );

        SuspicionScore {
            score,
            confidence,
            signals,
            contributions,
        }
    }
}

/// Geometric decay of a score with the given half-life.
pub fn decay(score: f64, elapsed: Duration, half_life_minutes: f64) -> f64 {
    let minutes = elapsed.num_milliseconds().max(0) as f64 / 60_000.0;
    score * 0.5_f64.powf(minutes / half_life_minutes)
}
