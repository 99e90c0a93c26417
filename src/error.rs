//! Error types for Refinr
//!
//! Centralized error handling using thiserror. The first four variants are the
//! pipeline's failure taxonomy; the rest are infrastructure errors that get
//! folded into one of them at stage boundaries.

use thiserror::Error;

use crate::domain::Stage;

/// All error types that can occur in Refinr
#[derive(Debug, Error)]
pub enum RefinrError {
    /// Backend call errored or timed out
    #[error("Generation failed in {stage}: {reason}")]
    GenerationFailed { stage: Stage, reason: String },

    /// A stage produced empty or whitespace-only content
    #[error("Empty artifact from {0}")]
    EmptyArtifact(Stage),

    /// Ledger or artifact store could not record a result
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// Fatal condition forced the run to stop early
    #[error("Run aborted: {0}")]
    RunAborted(String),

    /// Run not found in the ledger
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Prompt template error
    #[error("Template error: {0}")]
    Template(String),

    /// LLM API error
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RefinrError {
    /// Short taxonomy name, used when a failure is written into a record.
    pub fn kind(&self) -> &'static str {
        match self {
            RefinrError::GenerationFailed { .. } => "generation_failed",
            RefinrError::EmptyArtifact(_) => "empty_artifact",
            RefinrError::PersistenceFailed(_) => "persistence_failed",
            RefinrError::RunAborted(_) => "run_aborted",
            RefinrError::RunNotFound(_) => "run_not_found",
            RefinrError::InvalidState(_) => "invalid_state",
            RefinrError::Template(_) => "template",
            RefinrError::Llm(_) => "llm",
            RefinrError::Io(_) => "io",
            RefinrError::Json(_) => "json",
        }
    }

    /// Wrap any error raised while talking to the backend for `stage`.
    pub fn generation(stage: Stage, reason: impl Into<String>) -> Self {
        RefinrError::GenerationFailed {
            stage,
            reason: reason.into(),
        }
    }
}

/// Result type alias for Refinr operations
pub type Result<T> = std::result::Result<T, RefinrError>;
