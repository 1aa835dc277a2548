//! Engine configuration.
//!
//! A single immutable [`EngineConfig`] is loaded once and handed to every
//! component constructor. Every section deserializes with defaults, so an empty
//! TOML document is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notifications::NotificationConfig;
use crate::types::{MonitoringLevel, SessionMode, Subject};

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration for the session engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Defaults applied to newly started sessions.
    pub session: SessionDefaults,
    /// Suspicion scoring and decay.
    pub suspicion: SuspicionConfig,
    /// Socratic moderation and AI call policy.
    pub tutoring: TutoringConfig,
    /// Analytics derivation.
    pub analytics: AnalyticsConfig,
    /// Guardian intervention handling.
    pub interventions: InterventionConfig,
    /// Guardian notification delivery.
    pub notifications: NotificationConfig,
    /// Per-session mutation serialization.
    pub concurrency: ConcurrencyConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.suspicion;
        if !(s.threshold > 0.0 && s.threshold <= 1.0) {
            return Err(invalid("suspicion.threshold must be in (0, 1]"));
        }
        if !(s.threshold <= s.medium_cutoff && s.medium_cutoff <= s.high_cutoff && s.high_cutoff <= 1.0)
        {
            return Err(invalid(
                "suspicion cutoffs must satisfy threshold <= medium_cutoff <= high_cutoff <= 1",
            ));
        }
        if s.window_size == 0 {
            return Err(invalid("suspicion.window_size must be at least 1"));
        }
        if s.auto_suspend_unresolved == 0 {
            return Err(invalid("suspicion.auto_suspend_unresolved must be at least 1"));
        }
        if s.decay_half_life_minutes <= 0.0 {
            return Err(invalid("suspicion.decay_half_life_minutes must be positive"));
        }
        if s.off_hours_start > 23 || s.off_hours_end > 23 {
            return Err(invalid("suspicion off-hours bounds must be hours 0-23"));
        }
        if s.paste_full_chars <= s.paste_min_chars {
            return Err(invalid("suspicion.paste_full_chars must exceed paste_min_chars"));
        }
        if s.weights.as_array().iter().any(|(_, w)| *w < 0.0) {
            return Err(invalid("suspicion weights must be non-negative"));
        }

        let d = self.session.difficulty;
        if !(1..=10).contains(&d) {
            return Err(invalid("session.difficulty must be 1-10"));
        }
        if self.session.subjects.is_empty() {
            return Err(invalid("session.subjects must not be empty"));
        }

        let a = &self.analytics;
        let weights = [a.completion_weight, a.streak_weight, a.safety_weight];
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(invalid(
                "analytics weights must be non-negative with a positive sum",
            ));
        }
        if a.streak_target_days == 0 {
            return Err(invalid("analytics.streak_target_days must be at least 1"));
        }

        for pattern in self.tutoring.patterns.iter() {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::Invalid(format!(
                    "tutoring pattern '{}' is not a valid regex: {}",
                    pattern, e
                )));
            }
        }

        if self.notifications.max_attempts == 0 {
            return Err(invalid("notifications.max_attempts must be at least 1"));
        }
        if self.interventions.idempotency_bucket_secs == 0 {
            return Err(invalid("interventions.idempotency_bucket_secs must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

/// Defaults for newly started sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub mode: SessionMode,
    /// Difficulty 1-10.
    pub difficulty: u8,
    pub subjects: Vec<Subject>,
    pub monitoring_level: MonitoringLevel,
    pub requires_parent_approval: bool,
    /// Maximum accepted student message length in characters.
    pub max_message_chars: usize,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            mode: SessionMode::Socratic,
            difficulty: 5,
            subjects: vec![
                Subject::Math,
                Subject::Science,
                Subject::English,
                Subject::History,
            ],
            monitoring_level: MonitoringLevel::Standard,
            requires_parent_approval: true,
            max_message_chars: 4000,
        }
    }
}

/// Suspicion scoring configuration.
///
/// The weighting is product policy and is expected to be calibrated per
/// deployment; the defaults are a starting point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspicionConfig {
    /// Score at or above which a suspicion event is raised.
    pub threshold: f64,
    /// Score at or above which an event is medium severity.
    pub medium_cutoff: f64,
    /// Score at or above which an event is high severity.
    pub high_cutoff: f64,
    /// Maximum interactions in the history window.
    pub window_size: usize,
    /// Maximum age of interactions in the history window.
    pub window_minutes: i64,
    /// Unresolved events in one session that force suspension.
    pub auto_suspend_unresolved: usize,
    /// Half-life of an open event's score without new violations.
    pub decay_half_life_minutes: f64,
    /// Decayed score below which an open event resolves itself.
    pub decay_resolve_below: f64,
    /// Expected student message rate.
    pub baseline_messages_per_minute: f64,
    /// Message length where paste-burst scoring starts.
    pub paste_min_chars: usize,
    /// Message length where paste-burst scoring saturates.
    pub paste_full_chars: usize,
    /// First off-hours hour (UTC, inclusive).
    pub off_hours_start: u32,
    /// Last off-hours hour (UTC, inclusive).
    pub off_hours_end: u32,
    /// Graded answers needed before a correctness jump is considered.
    pub min_graded_for_jump: usize,
    /// Earlier messages in the window needed to judge a vocabulary shift.
    pub vocabulary_min_history: usize,
    pub weights: SignalWeights,
}

impl Default for SuspicionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            medium_cutoff: 0.75,
            high_cutoff: 0.8,
            window_size: 20,
            window_minutes: 10,
            auto_suspend_unresolved: 3,
            decay_half_life_minutes: 30.0,
            decay_resolve_below: 0.35,
            baseline_messages_per_minute: 4.0,
            paste_min_chars: 120,
            paste_full_chars: 600,
            off_hours_start: 23,
            off_hours_end: 5,
            min_graded_for_jump: 3,
            vocabulary_min_history: 5,
            weights: SignalWeights::default(),
        }
    }
}

/// Per-signal weights of the suspicion score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub input_velocity: f64,
    pub paste_burst: f64,
    pub correctness_jump: f64,
    pub off_hours: f64,
    pub clipboard_paste: f64,
    pub focus_loss: f64,
    pub external_ai_site: f64,
    pub solution_request: f64,
    pub vocabulary_shift: f64,
}

impl SignalWeights {
    /// All weights set to zero.
    pub fn zero() -> Self {
        Self {
            input_velocity: 0.0,
            paste_burst: 0.0,
            correctness_jump: 0.0,
            off_hours: 0.0,
            clipboard_paste: 0.0,
            focus_loss: 0.0,
            external_ai_site: 0.0,
            solution_request: 0.0,
            vocabulary_shift: 0.0,
        }
    }

    /// Weights keyed by signal name, in a fixed order.
    pub fn as_array(&self) -> [(&'static str, f64); 9] {
        [
            ("input_velocity", self.input_velocity),
            ("paste_burst", self.paste_burst),
            ("correctness_jump", self.correctness_jump),
            ("off_hours", self.off_hours),
            ("clipboard_paste", self.clipboard_paste),
            ("focus_loss", self.focus_loss),
            ("external_ai_site", self.external_ai_site),
            ("solution_request", self.solution_request),
            ("vocabulary_shift", self.vocabulary_shift),
        ]
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            input_velocity: 0.2,
            paste_burst: 0.25,
            correctness_jump: 0.2,
            off_hours: 0.1,
            clipboard_paste: 0.3,
            focus_loss: 0.15,
            external_ai_site: 0.45,
            solution_request: 0.2,
            vocabulary_shift: 0.25,
        }
    }
}

/// Socratic moderation and AI call configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TutoringConfig {
    /// Answer-seeking messages allowed per session.
    pub max_hint_count: u32,
    /// Token budget passed to the AI engine.
    pub response_max_tokens: u32,
    /// Timeout for a single AI call.
    pub ai_timeout_ms: u64,
    /// Extra attempts after a timed-out AI call.
    pub ai_retries: u32,
    /// Returned when the AI engine does not answer in time.
    pub fallback_prompt: String,
    /// Returned when a guardian has disabled the AI tutor.
    pub disabled_notice: String,
    pub patterns: PatternConfig,
}

impl Default for TutoringConfig {
    fn default() -> Self {
        Self {
            max_hint_count: 3,
            response_max_tokens: 1000,
            ai_timeout_ms: 5000,
            ai_retries: 1,
            fallback_prompt: "Let's slow down for a moment. What do you already know about \
                              this problem, and what would be a sensible first step?"
                .to_string(),
            disabled_notice: "Your tutor is switched off right now. Try working through the \
                              problem on your own and note where you get stuck."
                .to_string(),
            patterns: PatternConfig::default(),
        }
    }
}

/// Regex patterns used to classify student messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Requests for a finished answer or solution.
    pub direct_answer: Vec<String>,
    /// Requests for a hint.
    pub hint: Vec<String>,
    /// Student attempts at an answer.
    pub answer: Vec<String>,
    /// Homework and deadline language; only feeds the suspicion score.
    pub homework: Vec<String>,
}

impl PatternConfig {
    /// Every configured pattern, regardless of category.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.direct_answer
            .iter()
            .chain(&self.hint)
            .chain(&self.answer)
            .chain(&self.homework)
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            direct_answer: vec![
                r"(?i)\bwhat(?:'s| is) the (?:correct )?answer\b".to_string(),
                r"(?i)\bgive me the (?:answer|solution)\b".to_string(),
                r"(?i)\btell me the (?:answer|solution)\b".to_string(),
                r"(?i)\bjust tell me\b".to_string(),
                r"(?i)\bsolve (?:this|it) for me\b".to_string(),
                r"(?i)\bdo (?:this|my) (?:homework|assignment)\b".to_string(),
                r"(?i)\b(?:complete|finish) (?:this|my) (?:homework|assignment)\b".to_string(),
                r"(?i)\bwrite (?:this|my|an?) essay\b".to_string(),
                r"(?i)\bstep by step solution\b".to_string(),
                r"(?i)\banswer key\b".to_string(),
            ],
            hint: vec![
                r"(?i)\bhint\b".to_string(),
                r"(?i)\bhelp me\b".to_string(),
                r"(?i)\bi'?m stuck\b".to_string(),
                r"(?i)\bhow do i (?:start|begin|solve)\b".to_string(),
                r"(?i)\bwhere do i start\b".to_string(),
            ],
            answer: vec![
                r"(?i)^\s*(?:the answer is|i think (?:it'?s|the answer is)|my answer is)\b"
                    .to_string(),
                r"^\s*[-+]?\d+(?:[.,]\d+)?\s*$".to_string(),
                r"(?i)^\s*[a-z]\s*=\s*[-+]?\d".to_string(),
            ],
            homework: vec![
                r"(?i)\bhomework\b".to_string(),
                r"(?i)\bassignment\b".to_string(),
                r"(?i)\b(?:due|test|exam) tomorrow\b".to_string(),
                r"(?i)\bquiz\b".to_string(),
                r"(?i)\bworksheet\b".to_string(),
            ],
        }
    }
}

/// Analytics derivation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Gaps longer than this count only up to this value as learning time.
    pub max_idle_minutes: i64,
    /// Streak length that earns the full streak component.
    pub streak_target_days: u32,
    pub completion_weight: f64,
    pub streak_weight: f64,
    pub safety_weight: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_idle_minutes: 5,
            streak_target_days: 7,
            completion_weight: 0.5,
            streak_weight: 0.2,
            safety_weight: 0.3,
        }
    }
}

/// Guardian intervention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionConfig {
    /// Width of the timestamp bucket used to derive action ids.
    pub idempotency_bucket_secs: i64,
}

impl Default for InterventionConfig {
    fn default() -> Self {
        Self {
            idempotency_bucket_secs: 10,
        }
    }
}

/// Per-session lock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// How long a mutation waits for the session lock before failing.
    pub lock_wait_ms: u64,
    /// Retry hint returned with a busy error.
    pub retry_after_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            lock_wait_ms: 2000,
            retry_after_ms: 250,
        }
    }
}
