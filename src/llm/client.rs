//! LlmClient trait and a scriptable mock implementation

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RefinrError, Result};
use crate::llm::types::{CompletionRequest, CompletionResponse};

/// Stateless LLM client - each call is independent (fresh context)
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Model name used for requests that don't override it
    fn model(&self) -> &str;

    /// Whether the client has what it needs to make calls
    fn is_ready(&self) -> bool;
}

type Responder = dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync;

/// Mock client for tests.
///
/// Either replays a fixed queue of responses or delegates to a responder
/// closure. Every request is recorded.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String>>>,
    responder: Option<Box<Responder>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    /// Mock that answers every request with "mock response"
    pub fn new() -> Self {
        Self::with_responder(|_| Ok("mock response".to_string()))
    }

    /// Mock that replays `responses` in order, then errors
    pub fn scripted(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            responder: None,
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Mock that computes each response from the request
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responses: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before answering (for timeout tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue an error as the next scripted response
    pub fn push_error(&self, message: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(RefinrError::Llm(message.into())));
        }
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Requests whose label matches
    pub fn requests_labeled(&self, label: &str) -> Vec<CompletionRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.label.as_deref() == Some(label))
            .collect()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.requests
            .lock()
            .map_err(|e| RefinrError::Llm(e.to_string()))?
            .push(request.clone());

        let content = match &self.responder {
            Some(responder) => responder(&request)?,
            None => self
                .responses
                .lock()
                .map_err(|e| RefinrError::Llm(e.to_string()))?
                .pop_front()
                .unwrap_or_else(|| Err(RefinrError::Llm("mock responses exhausted".to_string())))?,
        };

        Ok(CompletionResponse::text(content))
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn is_ready(&self) -> bool {
        true
    }
}
