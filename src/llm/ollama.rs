//! Ollama client: local models over `/api/generate`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::error::{RefinrError, Result};
use crate::llm::client::LlmClient;
use crate::llm::types::{CompletionRequest, CompletionResponse, StopReason, Usage};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub const DEFAULT_MODEL: &str = "llama3";

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug)]
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RefinrError::Llm(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_ref().unwrap_or(&self.config.model);
        let mut body = json!({
            "model": model,
            "prompt": request.user_prompt(),
            "stream": false
        });

        if !request.system.is_empty() {
            body["system"] = json!(request.system);
        }
        if let Some(limit) = request.max_tokens.or(self.config.max_tokens) {
            body["options"] = json!({ "num_predict": limit });
        }

        body
    }

    fn parse_response(body: Value) -> Result<CompletionResponse> {
        let content = body["response"]
            .as_str()
            .ok_or_else(|| RefinrError::Llm("Ollama response missing 'response' field".to_string()))?
            .to_string();

        let stop_reason = match body["done_reason"].as_str() {
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        let usage = Usage::new(
            body["prompt_eval_count"].as_u64().unwrap_or(0),
            body["eval_count"].as_u64().unwrap_or(0),
        );

        Ok(CompletionResponse {
            content,
            stop_reason,
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = self.build_request(&request);
        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| RefinrError::Llm(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RefinrError::Llm(format!("Ollama error {}: {}", status, error_body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RefinrError::Llm(format!("Failed to parse response: {}", e)))?;
        Self::parse_response(body)
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        !self.config.base_url.is_empty()
    }
}
