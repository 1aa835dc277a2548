//! Individual misuse signals.
//!
//! Each signal maps its inputs to a value in [0, 1], or `None` when the inputs
//! it needs are missing. Missing signals lower the score's confidence; they
//! never stop scoring.

use std::collections::HashSet;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SuspicionConfig;
use crate::interaction::{AnswerOutcome, Interaction};

/// Optional flags from the external device-monitoring feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSignals {
    /// Text was pasted from the clipboard into the message.
    pub clipboard_paste: Option<bool>,
    /// Number of characters pasted, if the client measured it.
    pub paste_chars: Option<u32>,
    /// The tutoring window lost focus while composing.
    pub focus_loss: Option<bool>,
    /// A known AI assistant site was open during composition.
    pub external_ai_site: Option<bool>,
}

/// Pattern matches in a message's text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHits {
    /// Distinct direct-answer patterns matched.
    pub direct_requests: usize,
    /// Distinct homework or deadline patterns matched.
    pub homework_mentions: usize,
}

/// The interaction being scored, before it is recorded
#[derive(Debug, Clone)]
pub struct ScoringInput<'a> {
    pub message: &'a str,
    pub timestamp: DateTime<Utc>,
    pub outcome: Option<AnswerOutcome>,
    /// Session difficulty, 1-10.
    pub difficulty: u8,
    pub device: &'a DeviceSignals,
    pub content: ContentHits,
}

const DIRECT_REQUEST_WEIGHT: f64 = 0.4;
const HOMEWORK_WEIGHT: f64 = 0.2;

/// Words longer than this count as complex vocabulary.
const COMPLEX_WORD_CHARS: usize = 6;

/// Connectives and vocabulary typical of generated prose.
const FORMAL_MARKERS: [&str; 12] = [
    "furthermore",
    "moreover",
    "nevertheless",
    "consequently",
    "therefore",
    "thus",
    "utilize",
    "facilitate",
    "demonstrate",
    "implement",
    "comprehensive",
    "fundamental",
];

/// Messages per minute over the window against the baseline rate.
pub fn input_velocity(
    input: &ScoringInput<'_>,
    window: &[Interaction],
    config: &SuspicionConfig,
) -> Option<f64> {
    if window.len() < 2 || config.baseline_messages_per_minute <= 0.0 {
        return None;
    }
    let oldest = window.iter().map(|i| i.timestamp).min()?;
    let span_minutes = (input.timestamp - oldest).num_milliseconds() as f64 / 60_000.0;
    let rate = (window.len() + 1) as f64 / span_minutes.max(1.0);
    let baseline = config.baseline_messages_per_minute;
    Some(((rate - baseline) / baseline).clamp(0.0, 1.0))
}

/// Length of a paste-like burst of text.
pub fn paste_burst(input: &ScoringInput<'_>, config: &SuspicionConfig) -> Option<f64> {
    let typed = input.message.chars().count();
    let pasted = input.device.paste_chars.unwrap_or(0) as usize;
    let len = typed.max(pasted);
    if len <= config.paste_min_chars {
        return Some(0.0);
    }
    let span = (config.paste_full_chars - config.paste_min_chars) as f64;
    Some(((len - config.paste_min_chars) as f64 / span).clamp(0.0, 1.0))
}

/// A correct answer after a poor recent record, weighted by difficulty.
pub fn correctness_jump(
    input: &ScoringInput<'_>,
    window: &[Interaction],
    config: &SuspicionConfig,
) -> Option<f64> {
    let outcome = input.outcome?;
    let graded: Vec<_> = window.iter().filter(|i| i.is_graded()).collect();
    if graded.len() < config.min_graded_for_jump {
        return None;
    }
    if outcome == AnswerOutcome::Incorrect {
        return Some(0.0);
    }
    let correct = graded.iter().filter(|i| i.is_correct()).count();
    let prior_accuracy = correct as f64 / graded.len() as f64;
    let difficulty_factor = 0.5 + f64::from(input.difficulty.clamp(1, 10)) / 20.0;
    Some(((1.0 - prior_accuracy) * difficulty_factor).clamp(0.0, 1.0))
}

/// Activity inside the configured night window.
pub fn off_hours(input: &ScoringInput<'_>, config: &SuspicionConfig) -> Option<f64> {
    let hour = input.timestamp.hour();
    let (start, end) = (config.off_hours_start, config.off_hours_end);
    let inside = if start <= end {
        (start..=end).contains(&hour)
    } else {
        hour >= start || hour <= end
    };
    Some(if inside { 1.0 } else { 0.0 })
}

pub fn flag(value: Option<bool>) -> Option<f64> {
    value.map(|set| if set { 1.0 } else { 0.0 })
}

/// Asking for finished solutions or bringing homework to the tutor.
pub fn solution_request(input: &ScoringInput<'_>) -> Option<f64> {
    let hits = input.content;
    let value = DIRECT_REQUEST_WEIGHT * hits.direct_requests as f64
        + HOMEWORK_WEIGHT * hits.homework_mentions as f64;
    Some(value.min(1.0))
}

/// Shape of a piece of student writing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextProfile {
    pub words: usize,
    pub avg_sentence_words: f64,
    /// Distinct over total words.
    pub richness: f64,
    /// Share of words longer than six characters.
    pub complex_ratio: f64,
    /// Share of the formal marker list present, saturating at three.
    pub formal_markers: f64,
}

impl TextProfile {
    pub fn of(text: &str) -> Self {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        let sentences = text
            .split(['.', '!', '?'])
            .filter(|s| !s.trim().is_empty())
            .count()
            .max(1);

        let total = words.len().max(1) as f64;
        let distinct: HashSet<&str> = words.iter().map(String::as_str).collect();
        let complex = words
            .iter()
            .filter(|w| w.chars().count() > COMPLEX_WORD_CHARS)
            .count();
        let markers = FORMAL_MARKERS
            .iter()
            .filter(|m| words.iter().any(|w| w.starts_with(*m)))
            .count();

        Self {
            words: words.len(),
            avg_sentence_words: words.len() as f64 / sentences as f64,
            richness: distinct.len() as f64 / total,
            complex_ratio: complex as f64 / total,
            formal_markers: (markers as f64 / 3.0).min(1.0),
        }
    }

    /// Blend of sentence length, richness and complex vocabulary in [0, 1]
    pub fn complexity(&self) -> f64 {
        (self.avg_sentence_words / 15.0).min(1.0) * 0.3 + self.richness * 0.4 + self.complex_ratio * 0.3
    }
}

/// Writing markedly more sophisticated than the student's recent messages.
pub fn vocabulary_shift(
    input: &ScoringInput<'_>,
    window: &[Interaction],
    config: &SuspicionConfig,
) -> Option<f64> {
    if window.len() < config.vocabulary_min_history.max(1) {
        return None;
    }
    let current = TextProfile::of(input.message);
    let past: Vec<TextProfile> = window.iter().map(|i| TextProfile::of(&i.message)).collect();
    let n = past.len() as f64;
    let mean = |f: fn(&TextProfile) -> f64| past.iter().map(f).sum::<f64>() / n;

    let deviation = |current: f64, baseline: f64| (current - baseline) / baseline.max(0.1);
    let complexity = deviation(current.complexity(), mean(TextProfile::complexity));
    let vocabulary = deviation(current.complex_ratio, mean(|p: &TextProfile| p.complex_ratio));
    let sentences = deviation(current.avg_sentence_words, mean(|p: &TextProfile| p.avg_sentence_words));

    let mut value = 0.0;
    if complexity > 1.5 {
        value += 0.3;
    }
    if vocabulary > 2.0 {
        value += 0.4;
    }
    if sentences > 1.5 && current.avg_sentence_words > 20.0 {
        value += 0.2;
    }
    if current.formal_markers > 0.5 {
        value += 0.3 * current.formal_markers;
    }
    Some(value.min(1.0))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::interaction::{InteractionKind, TutorReply};
    use crate::session::SessionStatus;
    use crate::types::{InteractionId, SessionId};

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, second).unwrap()
    }

    fn past(seq: u32, timestamp: DateTime<Utc>, outcome: Option<AnswerOutcome>) -> Interaction {
        Interaction {
            id: InteractionId::generate(),
            session_id: SessionId::new("s"),
            seq,
            kind: InteractionKind::Answer,
            direct_answer_request: false,
            message: "x".to_string(),
            timestamp,
            reply: TutorReply::tutor("ok"),
            suspicion_score: 0.0,
            signals: Vec::new(),
            pedagogy_enforced: false,
            outcome,
            status_after: SessionStatus::Learning,
        }
    }

    fn input<'a>(message: &'a str, timestamp: DateTime<Utc>, device: &'a DeviceSignals) -> ScoringInput<'a> {
        ScoringInput {
            message,
            timestamp,
            outcome: None,
            difficulty: 5,
            device,
            content: ContentHits::default(),
        }
    }

    fn said(seq: u32, timestamp: DateTime<Utc>, message: &str) -> Interaction {
        Interaction {
            message: message.to_string(),
            ..past(seq, timestamp, None)
        }
    }

    #[test]
    fn velocity_needs_history() {
        let device = DeviceSignals::default();
        let config = SuspicionConfig::default();
        let now = at(15, 0, 0);
        assert_eq!(input_velocity(&input("hi", now, &device), &[], &config), None);
    }

    #[test]
    fn rapid_messages_raise_velocity() {
        let device = DeviceSignals::default();
        let config = SuspicionConfig::default();
        let now = at(15, 1, 0);
        let window: Vec<_> = (0..9)
            .map(|i| past(i, now - Duration::seconds(60 - i64::from(i) * 5), None))
            .collect();
        let value = input_velocity(&input("hi", now, &device), &window, &config).unwrap();
        // 10 messages in one minute against a baseline of 4/min
        assert!((value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn slow_messages_have_no_velocity_signal() {
        let device = DeviceSignals::default();
        let config = SuspicionConfig::default();
        let now = at(15, 10, 0);
        let window = vec![
            past(0, now - Duration::minutes(8), None),
            past(1, now - Duration::minutes(4), None),
        ];
        let value = input_velocity(&input("hi", now, &device), &window, &config).unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn paste_burst_scales_with_length() {
        let config = SuspicionConfig::default();
        let device = DeviceSignals::default();
        let now = at(15, 0, 0);
        assert_eq!(paste_burst(&input("short", now, &device), &config), Some(0.0));

        let long = "a".repeat(360);
        let value = paste_burst(&input(&long, now, &device), &config).unwrap();
        assert!((value - 0.5).abs() < 1e-9);
    }

    #[test]
    fn device_paste_length_counts_as_burst() {
        let config = SuspicionConfig::default();
        let device = DeviceSignals {
            paste_chars: Some(2000),
            ..Default::default()
        };
        let value = paste_burst(&input("ok", at(15, 0, 0), &device), &config).unwrap();
        assert_eq!(value, 1.0);
    }

    #[test]
    fn correct_answer_after_failures_is_a_jump() {
        let config = SuspicionConfig::default();
        let device = DeviceSignals::default();
        let now = at(15, 0, 0);
        let window: Vec<_> = (0..3)
            .map(|i| past(i, now - Duration::minutes(3), Some(AnswerOutcome::Incorrect)))
            .collect();
        let mut scored = input("42", now, &device);
        scored.outcome = Some(AnswerOutcome::Correct);
        scored.difficulty = 10;

        assert_eq!(correctness_jump(&scored, &window, &config), Some(1.0));
    }

    #[test]
    fn correctness_jump_needs_graded_history() {
        let config = SuspicionConfig::default();
        let device = DeviceSignals::default();
        let now = at(15, 0, 0);
        let window = vec![past(0, now, Some(AnswerOutcome::Incorrect))];
        let mut scored = input("42", now, &device);
        scored.outcome = Some(AnswerOutcome::Correct);

        assert_eq!(correctness_jump(&scored, &window, &config), None);
    }

    #[test]
    fn off_hours_wraps_midnight() {
        let config = SuspicionConfig::default();
        let device = DeviceSignals::default();
        assert_eq!(off_hours(&input("x", at(23, 30, 0), &device), &config), Some(1.0));
        assert_eq!(off_hours(&input("x", at(3, 0, 0), &device), &config), Some(1.0));
        assert_eq!(off_hours(&input("x", at(16, 0, 0), &device), &config), Some(0.0));
    }

    #[test]
    fn solution_requests_and_homework_add_up() {
        let device = DeviceSignals::default();
        let now = at(15, 0, 0);
        let mut scored = input("what is a prime?", now, &device);
        assert_eq!(solution_request(&scored), Some(0.0));

        scored.content = ContentHits {
            direct_requests: 1,
            homework_mentions: 1,
        };
        let value = solution_request(&scored).unwrap();
        assert!((value - 0.6).abs() < 1e-9);

        scored.content.direct_requests = 3;
        assert_eq!(solution_request(&scored), Some(1.0));
    }

    #[test]
    fn text_profile_measures_vocabulary() {
        let plain = TextProfile::of("is it 4?");
        assert_eq!(plain.words, 3);
        assert_eq!(plain.complex_ratio, 0.0);
        assert_eq!(plain.formal_markers, 0.0);

        let formal = TextProfile::of("Furthermore, this demonstrates a fundamental relationship.");
        assert_eq!(formal.formal_markers, 1.0);
        assert!(formal.complex_ratio > 0.5);
        assert!(formal.complexity() > plain.complexity());
    }

    #[test]
    fn vocabulary_shift_needs_history() {
        let config = SuspicionConfig::default();
        let device = DeviceSignals::default();
        let now = at(15, 0, 0);
        let window: Vec<_> = (0..4).map(|i| said(i, now, "is it 4?")).collect();
        assert_eq!(vocabulary_shift(&input("is it 5?", now, &device), &window, &config), None);
    }

    #[test]
    fn sudden_formal_prose_is_a_vocabulary_shift() {
        let config = SuspicionConfig::default();
        let device = DeviceSignals::default();
        let now = at(15, 0, 0);
        let window: Vec<_> = (0..5)
            .map(|i| said(i, now - Duration::minutes(1), "is it 4? i dont get it"))
            .collect();

        let same_voice = vocabulary_shift(&input("is it 5? i think so", now, &device), &window, &config);
        assert_eq!(same_voice, Some(0.0));

        let essay = "Furthermore, the fundamental theorem of calculus demonstrates a comprehensive \
                     relationship between differentiation and integration, consequently establishing \
                     that accumulated quantities correspond precisely to antiderivatives evaluated at boundaries.";
        let shifted = vocabulary_shift(&input(essay, now, &device), &window, &config).unwrap();
        assert!(shifted >= 0.6, "shift was {}", shifted);
    }

    #[test]
    fn flags_are_optional() {
        assert_eq!(flag(None), None);
        assert_eq!(flag(Some(true)), Some(1.0));
        assert_eq!(flag(Some(false)), Some(0.0));
    }
}
