//! Shared identifier and vocabulary types
//!
//! Relations between records are stored by id only; resolving an id is
//! always a store lookup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a learning session.
    SessionId
);
string_id!(
    /// Identifier of a person (student or guardian) as known to the identity service.
    ActorId
);
string_id!(
    /// Identifier of a family grouping students and guardians.
    FamilyId
);
string_id!(
    /// Identifier of a recorded interaction.
    InteractionId
);
string_id!(
    /// Identifier of a suspicion event.
    EventId
);
string_id!(
    /// Coordinator-assigned identifier of a guardian intervention.
    ActionId
);
string_id!(
    /// Identifier of a family notification.
    NotificationId
);

/// Tutoring policy of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionMode {
    /// Answers only through guiding questions.
    #[default]
    Socratic,
    Guided,
    Practice,
    Assessment,
    FreeExploration,
}

impl SessionMode {
    /// Whether the tutor must avoid fully worked solutions in this mode.
    pub fn withholds_solutions(self) -> bool {
        matches!(self, SessionMode::Socratic | SessionMode::Guided)
    }
}

/// Fixed subject vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Math,
    Science,
    English,
    History,
    Geography,
    ComputerScience,
    Languages,
    Art,
}

impl Subject {
    pub const ALL: [Subject; 8] = [
        Subject::Math,
        Subject::Science,
        Subject::English,
        Subject::History,
        Subject::Geography,
        Subject::ComputerScience,
        Subject::Languages,
        Subject::Art,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Science => "science",
            Subject::English => "english",
            Subject::History => "history",
            Subject::Geography => "geography",
            Subject::ComputerScience => "computer_science",
            Subject::Languages => "languages",
            Subject::Art => "art",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subject::ALL
            .into_iter()
            .find(|subject| subject.as_str() == s)
            .ok_or_else(|| format!("unknown subject '{}'", s))
    }
}

/// How aggressively signals are collected and scored for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringLevel {
    /// Scores are dampened before threshold comparison.
    Light,
    #[default]
    Standard,
    /// Scores are amplified before threshold comparison.
    Strict,
}

impl MonitoringLevel {
    /// Multiplier applied to raw suspicion scores.
    pub fn score_multiplier(self) -> f64 {
        match self {
            MonitoringLevel::Light => 0.8,
            MonitoringLevel::Standard => 1.0,
            MonitoringLevel::Strict => 1.25,
        }
    }
}
