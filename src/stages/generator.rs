//! Generator: the run's initial artifact.

use serde_json::json;

use super::{Stages, vars_with};
use crate::domain::{Artifact, RunContext, Stage};
use crate::error::Result;

impl Stages {
    /// Produce the initial artifact from the goal, domain, seed example,
    /// interpreted intent and focus area.
    pub async fn generate(&self, ctx: &RunContext, seed: &str) -> Result<Artifact> {
        let text = self
            .ask(Stage::Generate, vars_with(ctx, json!({ "seed": seed })))
            .await?;
        Ok(Artifact::new(ctx.kind, text))
    }
}
