//! Cleaner: reformat an artifact into a single fenced block.

use serde_json::json;

use super::Stages;
use super::aggregator::split_fenced;
use crate::domain::{Artifact, Stage};
use crate::error::Result;

/// Body of the outermost fenced block, or None if there is no opening fence
pub fn extract_fenced_block(text: &str) -> Option<String> {
    split_fenced(text).map(|(_, body, _)| body)
}

impl Stages {
    /// Ask for a cleaned copy of `artifact`. When the answer has no fence the
    /// whole answer is taken as the cleaned artifact.
    pub async fn clean(&self, artifact: &Artifact) -> Result<Artifact> {
        let text = self
            .ask(Stage::Clean, json!({ "artifact": artifact.content() }))
            .await?;
        let body = extract_fenced_block(&text).unwrap_or(text);
        Ok(artifact.derive(body))
    }
}
