//! Slow mock tutor for timeout and concurrency testing
//!
//! SlowMockTutor wraps MockTutor and sleeps before every reply, which makes
//! AI timeouts and mid-call interventions reproducible.

use std::time::Duration;

use async_trait::async_trait;

use super::mock::MockTutor;
use super::traits::{PedagogyConstraints, TutorBackend};
use crate::error::TutorError;

/// MockTutor wrapper that adds a configurable delay
pub struct SlowMockTutor {
    inner: MockTutor,
    delay: Duration,
}

impl SlowMockTutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockTutor::new(),
            delay,
        }
    }

    /// Queue a reply (delegates to inner)
    pub async fn queue_reply(&self, text: impl Into<String>) {
        self.inner.queue_reply(text).await;
    }

    pub fn call_count(&self) -> usize {
        self.inner.call_count()
    }
}

#[async_trait]
impl TutorBackend for SlowMockTutor {
    async fn generate(
        &self,
        prompt: &str,
        constraints: &PedagogyConstraints,
        timeout: Duration,
    ) -> Result<String, TutorError> {
        tokio::time::sleep(self.delay).await;
        self.inner.generate(prompt, constraints, timeout).await
    }

    fn name(&self) -> &'static str {
        "slow-mock"
    }
}
