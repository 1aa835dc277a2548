//! TutorBackend trait and the constraints passed with every prompt

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TutorError;
use crate::types::{SessionMode, Subject};

/// Pedagogy policy the AI engine must follow for one reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedagogyConstraints {
    pub mode: SessionMode,
    /// Fully worked solutions must not be given.
    pub withhold_solutions: bool,
    pub max_tokens: u32,
    /// 1-10
    pub difficulty: u8,
    pub subjects: Vec<Subject>,
    pub topic: Option<String>,
}

/// AI generation service
///
/// Implementations return the reply text, or an error when the engine is
/// unavailable. Callers enforce `timeout` themselves as well, so a backend
/// that ignores it is still bounded.
#[async_trait]
pub trait TutorBackend: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        constraints: &PedagogyConstraints,
        timeout: Duration,
    ) -> Result<String, TutorError>;

    /// Short name used in logs
    fn name(&self) -> &'static str {
        "tutor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== PedagogyConstraints Tests ====================

    #[test]
    fn constraints_serialize_mode_and_subjects() {
        let constraints = PedagogyConstraints {
            mode: SessionMode::FreeExploration,
            withhold_solutions: false,
            max_tokens: 500,
            difficulty: 3,
            subjects: vec![Subject::ComputerScience],
            topic: Some("loops".to_string()),
        };

        let json = serde_json::to_value(&constraints).unwrap();
        assert_eq!(json["mode"], "FREE_EXPLORATION");
        assert_eq!(json["subjects"][0], "computer_science");
        assert_eq!(json["topic"], "loops");
    }
}
