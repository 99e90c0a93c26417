//! LLM Client Layer - generation backends behind one trait
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction, plus a scriptable mock
//! - Anthropic and Ollama implementations
//! - Backend, the timeout-bounded wrapper the pipeline stages call

pub mod anthropic;
pub mod backend;
pub mod client;
pub mod ollama;
pub mod types;

use std::sync::Arc;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use backend::Backend;
pub use client::{LlmClient, MockLlmClient};
pub use ollama::{OllamaClient, OllamaConfig};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, Usage};

use crate::config::{LlmConfig, Provider};
use crate::error::Result;

/// Construct the client named by the config.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match config.provider {
        Provider::Anthropic => {
            let mut anthropic = AnthropicConfig::with_model(config.model.clone());
            anthropic.max_tokens = config.max_tokens;
            anthropic.timeout = config.timeout();
            if let Some(url) = &config.base_url {
                anthropic.api_url = url.clone();
            }
            Arc::new(AnthropicClient::new(anthropic)?)
        }
        Provider::Ollama => {
            let mut ollama = OllamaConfig {
                model: config.model.clone(),
                max_tokens: Some(config.max_tokens),
                timeout: config.timeout(),
                ..Default::default()
            };
            if let Some(url) = &config.base_url {
                ollama.base_url = url.clone();
            }
            Arc::new(OllamaClient::new(ollama)?)
        }
    };
    log::info!("Using {:?} backend with model {}", config.provider, client.model());
    Ok(client)
}

/// Build the pipeline backend from config.
pub fn build_backend(config: &LlmConfig) -> Result<Backend> {
    let client = build_client(config)?;
    Ok(Backend::new(client)
        .with_timeout(config.timeout())
        .with_max_tokens(config.max_tokens))
}
