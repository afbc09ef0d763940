//! Mock LLM Provider for testing
//!
//! Returns queued responses (or a default) without touching the network.
//! Clones share state, so a test can keep a handle after handing the
//! provider to a gateway.

use crate::gateway::ProviderRequest;
use crate::LlmError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    queue: VecDeque<Result<String, LlmError>>,
    requests: Vec<ProviderRequest>,
    call_count: usize,
}

/// Deterministic provider for tests and dry runs
#[derive(Clone)]
pub struct MockProvider {
    default_response: String,
    delay: Option<Duration>,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("")
    }
}

impl MockProvider {
    /// Provider answering `default_response` whenever the queue is empty
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            default_response: default_response.into(),
            delay: None,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a one-shot response
    pub fn queue_response(&self, response: impl Into<String>) {
        self.lock().queue.push_back(Ok(response.into()));
    }

    /// Queue a one-shot provider failure
    pub fn queue_error(&self, message: impl Into<String>) {
        self.lock().queue.push_back(Err(LlmError::Communication(message.into())));
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.lock().call_count
    }

    /// Reset the call counter and request log
    pub fn reset_call_count(&self) {
        let mut state = self.lock();
        state.call_count = 0;
        state.requests.clear();
    }

    /// Every request received, oldest first
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.lock().requests.clone()
    }

    /// Answer one request
    pub async fn complete(&self, request: &ProviderRequest) -> Result<String, LlmError> {
        let next = {
            let mut state = self.lock();
            state.call_count += 1;
            state.requests.push(request.clone());
            state.queue.pop_front()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        next.unwrap_or_else(|| Ok(self.default_response.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
