//! Mock tutor for testing and offline runs
//!
//! MockTutor replays scripted replies in order, enabling fast, deterministic
//! tests of the moderation and recording path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::{PedagogyConstraints, TutorBackend};
use crate::error::TutorError;

/// Reply used when nothing is queued
pub const DEFAULT_REPLY: &str = "Good question. What do you already know that might help here?";

/// Mock implementation of TutorBackend
///
/// Queue replies with `queue_reply()` or errors with `queue_error()`; each
/// `generate()` consumes one. With an empty queue every call returns
/// [`DEFAULT_REPLY`].
pub struct MockTutor {
    replies: Mutex<VecDeque<Result<String, TutorError>>>,
    prompts: Mutex<Vec<(String, PedagogyConstraints)>>,
    calls: AtomicUsize,
}

impl MockTutor {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a reply for a later `generate()`
    pub async fn queue_reply(&self, text: impl Into<String>) {
        self.replies.lock().await.push_back(Ok(text.into()));
    }

    /// Queue an error for a later `generate()`
    pub async fn queue_error(&self, error: TutorError) {
        self.replies.lock().await.push_back(Err(error));
    }

    /// Number of `generate()` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts and constraints received, in call order
    pub async fn prompts(&self) -> Vec<(String, PedagogyConstraints)> {
        self.prompts.lock().await.clone()
    }
}

impl Default for MockTutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TutorBackend for MockTutor {
    async fn generate(
        &self,
        prompt: &str,
        constraints: &PedagogyConstraints,
        _timeout: Duration,
    ) -> Result<String, TutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .await
            .push((prompt.to_string(), constraints.clone()));

        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionMode, Subject};

    fn constraints() -> PedagogyConstraints {
        PedagogyConstraints {
            mode: SessionMode::Socratic,
            withhold_solutions: true,
            max_tokens: 1000,
            difficulty: 5,
            subjects: vec![Subject::Math],
            topic: None,
        }
    }

    // ==================== Queue Tests ====================

    #[tokio::test]
    async fn replies_are_consumed_in_order() {
        let tutor = MockTutor::new();
        tutor.queue_reply("first").await;
        tutor.queue_reply("second").await;

        let timeout = Duration::from_secs(1);
        assert_eq!(tutor.generate("a", &constraints(), timeout).await.unwrap(), "first");
        assert_eq!(tutor.generate("b", &constraints(), timeout).await.unwrap(), "second");
        assert_eq!(
            tutor.generate("c", &constraints(), timeout).await.unwrap(),
            DEFAULT_REPLY
        );
        assert_eq!(tutor.call_count(), 3);
    }

    #[tokio::test]
    async fn queued_error_is_returned() {
        let tutor = MockTutor::new();
        tutor
            .queue_error(TutorError::Unavailable("model offline".to_string()))
            .await;

        let result = tutor
            .generate("a", &constraints(), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(TutorError::Unavailable(_))));
    }

    #[tokio::test]
    async fn prompts_are_recorded_with_constraints() {
        let tutor = MockTutor::new();
        tutor
            .generate("what is 2+2?", &constraints(), Duration::from_secs(1))
            .await
            .unwrap();

        let prompts = tutor.prompts().await;
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, "what is 2+2?");
        assert!(prompts[0].1.withhold_solutions);
    }
}
