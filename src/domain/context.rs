//! Run context: the inputs threaded through one run.
//!
//! A RunContext is built before a run starts, gets its interpreted intent
//! exactly once, and is then only read. The next run's context is a new value
//! built by [`RunContext::successor`]; nothing else crosses the run boundary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::artifact::ArtifactKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Free-text goal ("write a function that reverses a string")
    pub goal: String,

    /// What the artifact is about: functionality for code, topic for documents
    pub subject: String,

    /// Target domain: programming language or document type
    pub domain: String,

    /// Code or document
    pub kind: ArtifactKind,

    /// Seed example artifact, read once per run
    pub seed_path: PathBuf,

    /// Interpreted intent (None when interpretation failed or hasn't run)
    pub intent: Option<String>,

    /// Steering hint for this run
    pub focus_area: String,

    /// Next steps carried over from the previous run
    pub next_steps: String,

    /// Exact number of refinement iterations
    pub iteration_budget: u32,

    /// Run whose steering produced this context
    pub previous_run: Option<String>,
}

impl RunContext {
    /// Create a first-run context with the kind's default focus area and next steps.
    pub fn new(
        goal: impl Into<String>,
        kind: ArtifactKind,
        seed_path: impl Into<PathBuf>,
        iteration_budget: u32,
    ) -> Self {
        let goal = goal.into();
        Self {
            subject: goal.clone(),
            goal,
            domain: String::new(),
            kind,
            seed_path: seed_path.into(),
            intent: None,
            focus_area: kind.default_focus_area().to_string(),
            next_steps: kind.default_next_steps().to_string(),
            iteration_budget,
            previous_run: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_focus_area(mut self, focus_area: impl Into<String>) -> Self {
        self.focus_area = focus_area.into();
        self
    }

    pub fn with_next_steps(mut self, next_steps: impl Into<String>) -> Self {
        self.next_steps = next_steps.into();
        self
    }

    /// Attach the interpreted intent. Consumes self so the run holds the frozen value.
    pub fn with_intent(mut self, intent: Option<String>) -> Self {
        self.intent = intent.filter(|i| !i.trim().is_empty());
        self
    }

    /// Intent text for prompts; empty when the run is degraded.
    pub fn intent_text(&self) -> &str {
        self.intent.as_deref().unwrap_or("")
    }

    /// Build the next run's context from this run's derived steering.
    pub fn successor(
        &self,
        run_id: &str,
        focus_area: impl Into<String>,
        next_steps: impl Into<String>,
    ) -> Self {
        Self {
            goal: self.goal.clone(),
            subject: self.subject.clone(),
            domain: self.domain.clone(),
            kind: self.kind,
            seed_path: self.seed_path.clone(),
            intent: None,
            focus_area: focus_area.into(),
            next_steps: next_steps.into(),
            iteration_budget: self.iteration_budget,
            previous_run: Some(run_id.to_string()),
        }
    }
}
