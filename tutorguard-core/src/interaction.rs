//! Recorded interactions
//!
//! Interactions are immutable once recorded and only ever appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionStatus;
use crate::types::{InteractionId, SessionId};

/// What a student message is trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Question,
    Answer,
    HintRequest,
}

/// Grading outcome for an answer, supplied by an external grader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Correct,
    Incorrect,
}

/// Where the reply shown to the student came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// The AI engine, unmodified
    Tutor,
    /// Canned prompt after the AI engine timed out
    Fallback,
    /// The moderator answered without calling the AI engine
    Moderator,
}

/// Reply returned to the student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorReply {
    pub text: String,
    pub source: ReplySource,
}

impl TutorReply {
    pub fn tutor(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ReplySource::Tutor,
        }
    }

    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ReplySource::Fallback,
        }
    }

    pub fn moderator(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ReplySource::Moderator,
        }
    }
}

/// One student message and the tutor's reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub session_id: SessionId,
    /// Position within the session, starting at 0.
    pub seq: u32,
    pub kind: InteractionKind,
    /// The message asked for a finished answer rather than a hint.
    pub direct_answer_request: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub reply: TutorReply,
    pub suspicion_score: f64,
    /// Contributing signal names, strongest first.
    pub signals: Vec<String>,
    /// The moderator blocked this message under the Socratic policy.
    pub pedagogy_enforced: bool,
    pub outcome: Option<AnswerOutcome>,
    /// Session status once this interaction was recorded.
    pub status_after: SessionStatus,
}

impl Interaction {
    /// Whether this interaction asked for a hint or an answer
    pub fn is_answer_seeking(&self) -> bool {
        self.kind == InteractionKind::HintRequest
    }

    pub fn is_correct(&self) -> bool {
        self.outcome == Some(AnswerOutcome::Correct)
    }

    pub fn is_graded(&self) -> bool {
        self.outcome.is_some()
    }
}
