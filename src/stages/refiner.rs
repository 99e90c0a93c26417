//! Refiner: apply critique to an artifact.

use serde_json::json;

use super::{Stages, vars_with};
use crate::domain::{Artifact, RunContext, Stage};
use crate::error::{RefinrError, Result};

/// Combine the critic's outputs into the feedback the refiner sees.
/// Returns None when there is nothing to act on.
pub fn build_feedback(suggestions: Option<&str>, discrepancy: Option<&str>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(s) = suggestions.map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(format!("Suggestions:\n{}", s));
    }
    if let Some(d) = discrepancy.map(str::trim).filter(|d| !d.is_empty()) {
        parts.push(format!("Discrepancies with the example:\n{}", d));
    }
    if parts.is_empty() { None } else { Some(parts.join("\n\n")) }
}

impl Stages {
    /// Return a new artifact with `feedback` applied.
    ///
    /// An empty or unchanged answer is retried up to the configured number of
    /// attempts. Backend errors are not retried.
    pub async fn refine(&self, artifact: &Artifact, feedback: &str, ctx: &RunContext) -> Result<Artifact> {
        let vars = vars_with(ctx, json!({ "artifact": artifact.content(), "feedback": feedback }));
        let mut last_err = RefinrError::EmptyArtifact(Stage::Refine);

        for attempt in 1..=self.refine_attempts {
            match self.ask(Stage::Refine, vars.clone()).await {
                Ok(text) => {
                    let refined = artifact.derive(text);
                    if !refined.same_content(artifact) {
                        return Ok(refined);
                    }
                    log::warn!("Refine attempt {} returned the artifact unchanged", attempt);
                    last_err = RefinrError::generation(Stage::Refine, "artifact returned unchanged");
                }
                Err(RefinrError::EmptyArtifact(stage)) => {
                    log::warn!("Refine attempt {} returned nothing", attempt);
                    last_err = RefinrError::EmptyArtifact(stage);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::{context, stages_with};
    use super::*;
    use crate::domain::ArtifactKind;
    use crate::llm::MockLlmClient;

    fn artifact(s: &str) -> Artifact {
        Artifact::new(ArtifactKind::Code, s)
    }

    #[test]
    fn test_build_feedback() {
        assert_eq!(build_feedback(None, Some("  ")), None);
        assert_eq!(
            build_feedback(Some("1. docs"), None).as_deref(),
            Some("Suggestions:\n1. docs")
        );
        let both = build_feedback(Some("1. docs"), Some("naming differs")).unwrap();
        assert!(both.starts_with("Suggestions:\n1. docs\n\n"));
        assert!(both.ends_with("Discrepancies with the example:\nnaming differs"));
    }

    #[tokio::test]
    async fn test_refine_returns_new_artifact() {
        let mock = Arc::new(MockLlmClient::scripted(vec!["v1".to_string()]));
        let stages = stages_with(mock.clone());

        let refined = stages.refine(&artifact("v0"), "add docs", &context()).await.unwrap();
        assert_eq!(refined.content(), "v1");

        let prompt = mock.requests_labeled("refine")[0].user_prompt();
        assert!(prompt.contains("v0"));
        assert!(prompt.contains("add docs"));
    }

    #[tokio::test]
    async fn test_refine_retries_unchanged_then_succeeds() {
        let mock = Arc::new(MockLlmClient::scripted(vec![
            "  v0 ".to_string(),
            "   ".to_string(),
            "v1".to_string(),
        ]));
        let stages = stages_with(mock.clone()).with_refine_attempts(3);

        let refined = stages.refine(&artifact("v0"), "fb", &context()).await.unwrap();
        assert_eq!(refined.content(), "v1");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_refine_exhausts_attempts() {
        let mock = Arc::new(MockLlmClient::with_responder(|_| Ok("v0".to_string())));
        let stages = stages_with(mock.clone()).with_refine_attempts(2);

        let err = stages.refine(&artifact("v0"), "fb", &context()).await.unwrap_err();
        assert!(matches!(err, RefinrError::GenerationFailed { stage: Stage::Refine, .. }));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_refine_backend_error_not_retried() {
        let mock = Arc::new(MockLlmClient::scripted(vec![]));
        mock.push_error("down");
        let stages = stages_with(mock.clone()).with_refine_attempts(3);

        assert!(stages.refine(&artifact("v0"), "fb", &context()).await.is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
