//! Pipeline stages.
//!
//! Each stage is a method on [`Stages`]: render the stage's template, send it
//! through the [`Backend`], and turn the text that comes back into a typed
//! result. Stages hold no per-run state; everything they need arrives as
//! arguments.

mod aggregator;
mod cleaner;
mod critic;
mod evaluator;
mod generator;
mod intent;
mod refiner;
mod steering;

use serde_json::{Value, json};

pub use aggregator::{Aggregate, split_fenced};
pub use cleaner::extract_fenced_block;
pub use critic::{Suggestions, parse_suggestions};
pub use evaluator::parse_verdict;
pub use refiner::build_feedback;
pub use steering::is_terminal;

use crate::domain::{RunContext, Stage};
use crate::error::Result;
use crate::llm::Backend;
use crate::prompt::TemplateSet;

pub struct Stages {
    backend: Backend,
    templates: TemplateSet,
    refine_attempts: u32,
}

impl Stages {
    pub fn new(backend: Backend, templates: TemplateSet) -> Self {
        Self {
            backend,
            templates,
            refine_attempts: 3,
        }
    }

    /// How many times the refiner asks again after an empty or unchanged result
    pub fn with_refine_attempts(mut self, attempts: u32) -> Self {
        self.refine_attempts = attempts.max(1);
        self
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// Render `stage` with `vars` and send it
    async fn ask(&self, stage: Stage, vars: Value) -> Result<String> {
        let prompt = self.templates.render(stage, vars)?;
        self.backend.invoke(stage, &prompt.system, &prompt.user).await
    }
}

/// Template variables every stage can use
fn context_vars(ctx: &RunContext) -> Value {
    json!({
        "goal": ctx.goal,
        "subject": ctx.subject,
        "domain": ctx.domain,
        "intent": ctx.intent_text(),
        "focus_area": ctx.focus_area,
        "next_steps": ctx.next_steps,
    })
}

/// `context_vars` plus extra stage-specific fields
fn vars_with(ctx: &RunContext, extra: Value) -> Value {
    let mut vars = context_vars(ctx);
    if let (Value::Object(base), Value::Object(extra)) = (&mut vars, extra) {
        base.extend(extra);
    }
    vars
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ArtifactKind;

    #[test]
    fn test_vars_with_merges_extra() {
        let ctx = RunContext::new("goal", ArtifactKind::Code, "seed.txt", 1);
        let vars = vars_with(&ctx, json!({ "artifact": "x", "goal": "override" }));
        assert_eq!(vars["artifact"], "x");
        assert_eq!(vars["goal"], "override");
        assert_eq!(vars["intent"], "");
    }

    #[test]
    fn test_refine_attempts_floor() {
        let stages = test_support::stages_with(std::sync::Arc::new(crate::llm::MockLlmClient::new()))
            .with_refine_attempts(0);
        assert_eq!(stages.refine_attempts, 1);
    }
}
