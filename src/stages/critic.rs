//! Critic / Analyzer: suggestions, seed discrepancies and version comparison.

use serde_json::json;

use super::{Stages, vars_with};
use crate::domain::{Artifact, RunContext, Stage};
use crate::error::Result;

/// Ordered improvement suggestions plus the critic's full answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestions {
    pub items: Vec<String>,
    pub raw: String,
}

impl Suggestions {
    pub fn from_text(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            items: parse_suggestions(&raw),
            raw,
        }
    }
}

impl Stages {
    pub async fn suggest(&self, artifact: &Artifact, ctx: &RunContext) -> Result<Suggestions> {
        let text = self
            .ask(Stage::Suggest, vars_with(ctx, json!({ "artifact": artifact.content() })))
            .await?;
        Ok(Suggestions::from_text(text))
    }

    /// Where the artifact diverges from the seed example
    pub async fn check_discrepancies(&self, seed: &str, artifact: &Artifact, ctx: &RunContext) -> Result<String> {
        self.ask(
            Stage::Discrepancy,
            vars_with(ctx, json!({ "seed": seed, "artifact": artifact.content() })),
        )
        .await
    }

    /// Compare the new artifact with the current best and the previous one
    pub async fn compare(
        &self,
        new: &Artifact,
        best: &Artifact,
        previous: &Artifact,
        ctx: &RunContext,
    ) -> Result<String> {
        self.ask(
            Stage::Compare,
            vars_with(
                ctx,
                json!({
                    "new": new.content(),
                    "best": best.content(),
                    "previous": previous.content(),
                }),
            ),
        )
        .await
    }
}

/// List marker length if `line` (already left-trimmed) starts a list item
fn list_marker(line: &str) -> Option<usize> {
    for bullet in ["- ", "* ", "• "] {
        if line.starts_with(bullet) {
            return Some(bullet.len());
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if rest.starts_with(". ") || rest.starts_with(") ") {
            return Some(digits + 2);
        }
    }
    None
}

/// Split critic output into items.
///
/// Items are list lines at the outermost list indentation. Deeper lines and
/// continuation text attach to the item above. Text before the first item is
/// dropped. With no list at all, the whole text is one item.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut base_indent: Option<usize> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        let indent = line.len() - trimmed.len();

        match (list_marker(trimmed), base_indent) {
            (Some(len), None) => {
                base_indent = Some(indent);
                items.push(trimmed[len..].trim().to_string());
            }
            (Some(len), Some(base)) if indent <= base => {
                items.push(trimmed[len..].trim().to_string());
            }
            _ => {
                if let Some(current) = items.last_mut() {
                    current.push('\n');
                    current.push_str(trimmed.trim_end());
                }
            }
        }
    }

    items.retain(|i| !i.trim().is_empty());
    if items.is_empty() && !text.trim().is_empty() {
        items.push(text.trim().to_string());
    }
    items
}
