//! Next steps and focus area for the following run.

use serde_json::json;

use super::{Stages, vars_with};
use crate::domain::{Artifact, RunContext, Stage};
use crate::error::{RefinrError, Result};

const TERMINAL_PHRASES: &[&str] = &[
    "no more next steps",
    "no further next steps",
    "no further improvements",
    "no further improvement is",
    "no further improvements are",
];

/// Whether next-steps text says the loop is done
pub fn is_terminal(next_steps: &str) -> bool {
    let lower = next_steps.trim().to_lowercase();
    lower.is_empty() || TERMINAL_PHRASES.iter().any(|p| lower.contains(p))
}

/// Drop a leading "New Focus Area:" style label the model sometimes echoes
fn strip_label<'a>(text: &'a str, label: &str) -> &'a str {
    let trimmed = text.trim();
    match trimmed.get(..label.len()) {
        Some(head) if head.eq_ignore_ascii_case(label) => trimmed[label.len()..].trim(),
        _ => trimmed,
    }
}

impl Stages {
    /// What the next run should work on. An empty answer is returned as an
    /// empty string, which the driver treats as terminal.
    pub async fn next_steps(&self, best: &Artifact, ctx: &RunContext) -> Result<String> {
        match self
            .ask(Stage::NextSteps, vars_with(ctx, json!({ "artifact": best.content() })))
            .await
        {
            Ok(text) => Ok(strip_label(&text, "Next Steps:").to_string()),
            Err(RefinrError::EmptyArtifact(_)) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Derive the next run's focus area from the next steps
    pub async fn focus_area(&self, ctx: &RunContext, next_steps: &str) -> Result<String> {
        let text = self
            .ask(
                Stage::FocusArea,
                vars_with(
                    ctx,
                    json!({ "previous_focus_area": ctx.focus_area, "next_steps": next_steps }),
                ),
            )
            .await?;
        let focus = strip_label(&text, "New Focus Area:");
        if focus.is_empty() {
            return Err(RefinrError::EmptyArtifact(Stage::FocusArea));
        }
        Ok(focus.to_string())
    }
}
