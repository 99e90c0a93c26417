//! Backend: the single entry point stages use to reach the model.
//!
//! Every call is one attempt bounded by a timeout. Transport errors and
//! timeouts become [`RefinrError::GenerationFailed`] for the calling stage;
//! blank output becomes [`RefinrError::EmptyArtifact`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::domain::Stage;
use crate::error::{RefinrError, Result};
use crate::llm::client::LlmClient;
use crate::llm::types::CompletionRequest;

#[derive(Clone)]
pub struct Backend {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
    max_tokens: Option<u32>,
}

impl Backend {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(120),
            max_tokens: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one prompt for `stage` and return the trimmed text.
    pub async fn invoke(&self, stage: Stage, system: &str, prompt: &str) -> Result<String> {
        let mut request = CompletionRequest::new(system)
            .with_user_message(prompt)
            .with_label(stage.as_str());
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let start = Instant::now();
        let response = tokio::time::timeout(self.timeout, self.client.complete(request))
            .await
            .map_err(|_| RefinrError::generation(stage, format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| RefinrError::generation(stage, e.to_string()))?;

        debug!(
            "{} call finished in {}ms ({} output tokens)",
            stage,
            start.elapsed().as_millis(),
            response.usage.output_tokens
        );
        if response.stop_reason.is_truncated() {
            warn!("{} output hit the token limit and may be truncated", stage);
        }

        let text = response.content.trim();
        if text.is_empty() {
            return Err(RefinrError::EmptyArtifact(stage));
        }
        Ok(text.to_string())
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("model", &self.client.model())
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
