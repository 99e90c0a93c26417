//! Aggregator: merge latest, initial and good-enough variants.

use serde_json::json;

use super::{Stages, vars_with};
use crate::domain::{Artifact, RunContext, Stage};
use crate::error::{RefinrError, Result};

/// Merged artifact plus the explanation that came with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub artifact: Artifact,
    pub rationale: String,
}

/// Backtick run length of a fence line and whether it is bare (no info string)
fn fence(line: &str) -> Option<(usize, bool)> {
    let trimmed = line.trim();
    let ticks = trimmed.chars().take_while(|c| *c == '`').count();
    if ticks < 3 {
        return None;
    }
    Some((ticks, trimmed[ticks..].trim().is_empty()))
}

/// Split text around its outermost fenced block: (before, body, after).
///
/// The block opens at the first fence line and closes at the last bare fence
/// at least as long as the opening one, so nested blocks such as
/// "```bash" inside a markdown document stay in the body. An unclosed fence
/// runs to the end of the text.
pub fn split_fenced(text: &str) -> Option<(String, String, String)> {
    let lines: Vec<&str> = text.lines().collect();
    let (open, width) = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| fence(line).map(|(ticks, _)| (i, ticks)))?;

    let close = lines
        .iter()
        .enumerate()
        .skip(open + 1)
        .rev()
        .find(|(_, line)| matches!(fence(line), Some((ticks, true)) if ticks >= width))
        .map(|(i, _)| i)
        .unwrap_or(lines.len());

    let after = lines.get(close + 1..).unwrap_or_default();
    Some((
        lines[..open].join("\n").trim().to_string(),
        lines[open + 1..close].join("\n").trim_end().to_string(),
        after.join("\n").trim().to_string(),
    ))
}

impl Stages {
    /// Combine three variants into one. Every input must be non-empty.
    pub async fn aggregate(
        &self,
        latest: &Artifact,
        initial: &Artifact,
        good_enough: &Artifact,
        ctx: &RunContext,
    ) -> Result<Aggregate> {
        if latest.is_blank() || initial.is_blank() || good_enough.is_blank() {
            return Err(RefinrError::EmptyArtifact(Stage::Aggregate));
        }

        let text = self
            .ask(
                Stage::Aggregate,
                vars_with(
                    ctx,
                    json!({
                        "latest": latest.content(),
                        "initial": initial.content(),
                        "good_enough": good_enough.content(),
                    }),
                ),
            )
            .await?;

        let (artifact_text, rationale) = match split_fenced(&text) {
            Some((before, body, after)) => {
                let rationale = [before, after]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                (body, rationale)
            }
            None => (text, String::new()),
        };

        if artifact_text.trim().is_empty() {
            return Err(RefinrError::EmptyArtifact(Stage::Aggregate));
        }

        Ok(Aggregate {
            artifact: latest.derive(artifact_text),
            rationale,
        })
    }
}
