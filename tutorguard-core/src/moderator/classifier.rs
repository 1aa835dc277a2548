//! Pattern-based message classification
//!
//! Classifies student messages with configurable regex patterns.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analyzer::ContentHits;
use crate::config::{ConfigError, PatternConfig};
use crate::interaction::InteractionKind;

/// A compiled pattern with its source text
struct CompiledPattern {
    regex: Regex,
    pattern_str: String,
}

/// Result of classifying one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: InteractionKind,
    /// The message asks for a finished answer; always a hint request.
    pub direct_answer_request: bool,
    /// Pattern that decided the classification, if any.
    pub matched: Option<String>,
}

impl Classification {
    /// Hint requests, including direct-answer requests
    pub fn is_answer_seeking(&self) -> bool {
        self.kind == InteractionKind::HintRequest
    }
}

/// Regex-based message classifier
pub struct MessageClassifier {
    direct_answer: Vec<CompiledPattern>,
    hint: Vec<CompiledPattern>,
    answer: Vec<CompiledPattern>,
    homework: Vec<CompiledPattern>,
}

impl MessageClassifier {
    /// Compile the configured patterns
    pub fn from_patterns(patterns: &PatternConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            direct_answer: compile("direct_answer", &patterns.direct_answer)?,
            hint: compile("hint", &patterns.hint)?,
            answer: compile("answer", &patterns.answer)?,
            homework: compile("homework", &patterns.homework)?,
        })
    }

    pub fn pattern_count(&self) -> usize {
        self.direct_answer.len() + self.hint.len() + self.answer.len() + self.homework.len()
    }

    /// Count the distinct solution-request and homework patterns a message hits
    pub fn content_hits(&self, message: &str) -> ContentHits {
        ContentHits {
            direct_requests: match_count(&self.direct_answer, message),
            homework_mentions: match_count(&self.homework, message),
        }
    }

    /// Classify a message
    ///
    /// Direct-answer patterns win over hint patterns, which win over answer
    /// patterns. Anything unmatched is a question.
    pub fn classify(&self, message: &str) -> Classification {
        if let Some(p) = first_match(&self.direct_answer, message) {
            return Classification {
                kind: InteractionKind::HintRequest,
                direct_answer_request: true,
                matched: Some(p.pattern_str.clone()),
            };
        }
        if let Some(p) = first_match(&self.hint, message) {
            return Classification {
                kind: InteractionKind::HintRequest,
                direct_answer_request: false,
                matched: Some(p.pattern_str.clone()),
            };
        }
        if let Some(p) = first_match(&self.answer, message) {
            return Classification {
                kind: InteractionKind::Answer,
                direct_answer_request: false,
                matched: Some(p.pattern_str.clone()),
            };
        }
        Classification {
            kind: InteractionKind::Question,
            direct_answer_request: false,
            matched: None,
        }
    }
}

fn compile(category: &str, patterns: &[String]) -> Result<Vec<CompiledPattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            let regex = Regex::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("invalid {} pattern '{}': {}", category, pattern, e))
            })?;
            Ok(CompiledPattern {
                regex,
                pattern_str: pattern.clone(),
            })
        })
        .collect()
}

fn match_count(patterns: &[CompiledPattern], message: &str) -> usize {
    patterns.iter().filter(|p| p.regex.is_match(message)).count()
}

fn first_match<'a>(patterns: &'a [CompiledPattern], message: &str) -> Option<&'a CompiledPattern> {
    patterns.iter().find(|p| p.regex.is_match(message))
}
