//! Evaluator: structured pass/fail judgment.
//!
//! The judge is told to end with `{"meets_requirements": <bool>}`. The last
//! JSON object in the response carrying that boolean field is the verdict;
//! the surrounding text is kept as the rationale. Prose is never scanned for
//! phrases.

use serde_json::{Value, json};

use super::{Stages, vars_with};
use crate::domain::{Artifact, RunContext, Stage, Verdict};
use crate::error::{RefinrError, Result};

impl Stages {
    pub async fn evaluate(&self, artifact: &Artifact, ctx: &RunContext) -> Result<Verdict> {
        let text = self
            .ask(Stage::Evaluate, vars_with(ctx, json!({ "artifact": artifact.content() })))
            .await?;
        parse_verdict(&text)
    }
}

/// Pull the verdict out of a judge response
pub fn parse_verdict(text: &str) -> Result<Verdict> {
    let starts: Vec<usize> = text.match_indices('{').map(|(i, _)| i).collect();

    for &start in starts.iter().rev() {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        let Some(Ok(Value::Object(map))) = stream.next() else {
            continue;
        };
        let Some(meets) = map.get("meets_requirements").and_then(Value::as_bool) else {
            continue;
        };

        let end = start + stream.byte_offset();
        let before = text[..start].trim_end();
        let before = before
            .strip_suffix("```json")
            .or_else(|| before.strip_suffix("```"))
            .unwrap_or(before)
            .trim();
        let after = text[end..].trim_start();
        let after = after.strip_prefix("```").unwrap_or(after).trim();

        let rationale = [before, after]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n");

        return Ok(Verdict {
            meets_requirements: meets,
            rationale,
        });
    }

    Err(RefinrError::generation(
        Stage::Evaluate,
        "response did not include a meets_requirements verdict",
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::{context, stages_with};
    use super::*;
    use crate::domain::ArtifactKind;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_parse_verdict_trailing_object() {
        let text = "Readable and correct.\nHandles empty input.\n{\"meets_requirements\": true}";
        let verdict = parse_verdict(text).unwrap();
        assert!(verdict.meets_requirements);
        assert_eq!(verdict.rationale, "Readable and correct.\nHandles empty input.");
    }

    #[test]
    fn test_parse_verdict_false() {
        let verdict = parse_verdict("Missing docs. {\"meets_requirements\": false}").unwrap();
        assert!(!verdict.meets_requirements);
        assert_eq!(verdict.rationale, "Missing docs.");
    }

    #[test]
    fn test_parse_verdict_ignores_phrases() {
        // Prose that looks like a pass does not count without the field
        let result = parse_verdict("The code meets the user's requirements.");
        assert!(matches!(
            result,
            Err(RefinrError::GenerationFailed { stage: Stage::Evaluate, .. })
        ));
    }

    #[test]
    fn test_parse_verdict_uses_last_object() {
        let text = "Earlier I thought {\"meets_requirements\": true} but on review:\n{\"meets_requirements\": false}";
        assert!(!parse_verdict(text).unwrap().meets_requirements);
    }

    #[test]
    fn test_parse_verdict_skips_code_braces_and_wrong_types() {
        let text = "fn f() { 1 }\n{\"meets_requirements\": \"yes\"}\n{\"meets_requirements\": true, \"score\": 9}\nthanks";
        let verdict = parse_verdict(text).unwrap();
        assert!(verdict.meets_requirements);
        assert!(verdict.rationale.ends_with("thanks"));
    }

    #[test]
    fn test_parse_verdict_fenced_json() {
        let text = "Looks good.\n```json\n{\"meets_requirements\": true}\n```";
        let verdict = parse_verdict(text).unwrap();
        assert!(verdict.meets_requirements);
        assert_eq!(verdict.rationale, "Looks good.");
    }

    #[tokio::test]
    async fn test_evaluate_sends_artifact_and_focus() {
        let mock = Arc::new(MockLlmClient::scripted(vec![
            "Fine.\n{\"meets_requirements\": true}".to_string(),
        ]));
        let stages = stages_with(mock.clone());
        let artifact = Artifact::new(ArtifactKind::Code, "def rev(s): return s[::-1]");

        let verdict = stages.evaluate(&artifact, &context()).await.unwrap();
        assert!(verdict.meets_requirements);

        let prompt = mock.requests_labeled("evaluate")[0].user_prompt();
        assert!(prompt.contains("def rev(s): return s[::-1]"));
        assert!(prompt.contains(&context().focus_area));
    }
}
