//! Socratic dialogue moderator
//!
//! The moderator decides whether a student message may reach the AI engine
//! and under which pedagogy constraints. It never scores messages for misuse;
//! that is the analyzer's job.

pub mod classifier;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use classifier::{Classification, MessageClassifier};

use crate::analyzer::ContentHits;
use crate::config::{ConfigError, TutoringConfig};
use crate::interaction::{ReplySource, TutorReply};
use crate::session::LearningSession;
use crate::tutor::{PedagogyConstraints, TutorBackend};
use crate::types::SessionMode;

const COUNTER_QUESTIONS: [&str; 4] = [
    "Before we go further, what have you tried so far, and where did it stop making sense?",
    "Which part of the problem do you understand best? Start there and tell me your next step.",
    "If you explained the problem to a friend in your own words, what would you say it asks?",
    "What would a good first step look like, even if you are not sure it is right?",
];

/// What to do with a student message
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationDecision {
    /// Send the message to the AI engine
    Forward {
        classification: Classification,
        /// The message takes one hint from the session budget.
        consumes_hint: bool,
        constraints: PedagogyConstraints,
    },
    /// Hint budget exhausted under the Socratic policy
    Block {
        classification: Classification,
        counter_question: String,
    },
    /// A guardian switched the AI tutor off
    Disabled {
        classification: Classification,
        notice: String,
    },
}

impl ModerationDecision {
    pub fn classification(&self) -> &Classification {
        match self {
            ModerationDecision::Forward { classification, .. }
            | ModerationDecision::Block { classification, .. }
            | ModerationDecision::Disabled { classification, .. } => classification,
        }
    }
}

/// Result of forwarding a message to the AI engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forwarded {
    pub reply: TutorReply,
    pub attempts: u32,
}

impl Forwarded {
    /// The AI engine did not answer and the fallback prompt was used
    pub fn degraded(&self) -> bool {
        self.reply.source == ReplySource::Fallback
    }
}

/// Enforces the hint and answer-reveal policy
pub struct SocraticModerator {
    classifier: MessageClassifier,
    config: TutoringConfig,
}

impl SocraticModerator {
    pub fn new(config: &TutoringConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            classifier: MessageClassifier::from_patterns(&config.patterns)?,
            config: config.clone(),
        })
    }

    pub fn classify(&self, message: &str) -> Classification {
        self.classifier.classify(message)
    }

    /// Solution-request and homework pattern hits, for suspicion scoring
    pub fn content_hits(&self, message: &str) -> ContentHits {
        self.classifier.content_hits(message)
    }

    /// Decide what happens to a message in the current session
    pub fn moderate(&self, session: &LearningSession, message: &str) -> ModerationDecision {
        let classification = self.classifier.classify(message);

        if !session.ai_enabled {
            return ModerationDecision::Disabled {
                classification,
                notice: self.config.disabled_notice.clone(),
            };
        }

        let answer_seeking = classification.is_answer_seeking();
        let exhausted = session.hint_count >= self.config.max_hint_count;

        if answer_seeking && exhausted && session.mode == SessionMode::Socratic {
            debug!(
                session_id = %session.id,
                hint_count = session.hint_count,
                direct = classification.direct_answer_request,
                "Answer-seeking message blocked"
            );
            return ModerationDecision::Block {
                classification,
                counter_question: counter_question(session),
            };
        }

        ModerationDecision::Forward {
            classification,
            consumes_hint: answer_seeking && !exhausted,
            constraints: self.constraints(session),
        }
    }

    /// Pedagogy constraints for the session's current settings
    pub fn constraints(&self, session: &LearningSession) -> PedagogyConstraints {
        PedagogyConstraints {
            mode: session.mode,
            withhold_solutions: session.mode.withholds_solutions(),
            max_tokens: self.config.response_max_tokens,
            difficulty: session.difficulty,
            subjects: session.subjects.iter().copied().collect(),
            topic: session.current_topic.clone(),
        }
    }

    /// Call the AI engine with timeout and retry, degrading to the fallback
    ///
    /// Never fails: timeouts and unavailability are recovered locally.
    pub async fn forward(
        &self,
        tutor: &dyn TutorBackend,
        message: &str,
        constraints: &PedagogyConstraints,
    ) -> Forwarded {
        let timeout = Duration::from_millis(self.config.ai_timeout_ms);
        let max_attempts = self.config.ai_retries + 1;

        for attempt in 1..=max_attempts {
            match tokio::time::timeout(timeout, tutor.generate(message, constraints, timeout)).await {
                Ok(Ok(text)) => {
                    return Forwarded {
                        reply: TutorReply::tutor(text),
                        attempts: attempt,
                    };
                }
                Ok(Err(e)) => {
                    warn!(backend = tutor.name(), attempt, error = %e, "AI engine call failed");
                }
                Err(_) => {
                    warn!(
                        backend = tutor.name(),
                        attempt,
                        timeout_ms = self.config.ai_timeout_ms,
                        "AI engine call timed out"
                    );
                }
            }
        }

        Forwarded {
            reply: TutorReply::fallback(self.config.fallback_prompt.clone()),
            attempts: max_attempts,
        }
    }
}

fn counter_question(session: &LearningSession) -> String {
    let question = COUNTER_QUESTIONS[session.safety_violation_count as usize % COUNTER_QUESTIONS.len()];
    match &session.current_topic {
        Some(topic) => format!("Let's work on {} together. {}", topic, question),
        None => question.to_string(),
    }
}
