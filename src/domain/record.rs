//! Iteration and run records kept by the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::artifact::Artifact;
use super::context::RunContext;
use super::stage::Stage;
use crate::error::RefinrError;

/// The evaluator's judgment of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Explicit structured field returned by the judge
    pub meets_requirements: bool,
    /// Full-text reasoning
    pub rationale: String,
}

/// A stage failure caught at an iteration (or seal) boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    /// Taxonomy name from [`RefinrError::kind`]
    pub kind: String,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn from_error(stage: Stage, err: &RefinrError) -> Self {
        Self::new(stage, err.kind(), err.to_string())
    }
}

/// One evaluate → critique → refine → aggregate pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based, contiguous within a run
    pub index: u32,

    pub before: Artifact,

    /// Refined artifact, or `before` carried forward when refinement failed
    pub after: Artifact,

    pub refined: bool,

    pub verdict: Option<Verdict>,

    pub suggestions: Vec<String>,

    /// Raw critic output
    pub critique: Option<String>,

    pub discrepancy: Option<String>,

    /// New vs best vs previous comparison
    pub analysis: Option<String>,

    /// `after` run through the cleaner
    pub cleaned: Option<Artifact>,

    pub aggregate: Option<Artifact>,

    pub aggregate_rationale: Option<String>,

    pub failures: Vec<StageFailure>,

    pub duration_ms: u64,

    /// Persisted document IDs by name
    pub documents: BTreeMap<String, String>,
}

impl IterationRecord {
    /// Start a record for an iteration on `before`; fields are filled as stages complete.
    pub fn begin(index: u32, before: Artifact) -> Self {
        Self {
            index,
            after: before.clone(),
            before,
            refined: false,
            verdict: None,
            suggestions: Vec::new(),
            critique: None,
            discrepancy: None,
            analysis: None,
            cleaned: None,
            aggregate: None,
            aggregate_rationale: None,
            failures: Vec::new(),
            duration_ms: 0,
            documents: BTreeMap::new(),
        }
    }

    /// Whether any stage in this iteration failed
    pub fn is_failed(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Whether the evaluator judged `before` as meeting requirements
    pub fn passed(&self) -> bool {
        self.verdict.as_ref().is_some_and(|v| v.meets_requirements)
    }

    pub fn failed_stages(&self) -> Vec<Stage> {
        self.failures.iter().map(|f| f.stage).collect()
    }
}

/// Final values written when a run is sealed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalArtifacts {
    pub initial: Artifact,
    pub best: Artifact,
    pub good_enough: Option<Artifact>,
    /// Iteration whose verdict produced `good_enough`
    pub good_enough_iteration: Option<u32>,
    pub final_aggregate: Option<Artifact>,
    pub final_rationale: Option<String>,
    pub failures: Vec<StageFailure>,
    pub documents: BTreeMap<String, String>,
}

/// Steering derived after a run: what the next run works on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Steering {
    pub next_steps: String,
    /// None when the outer loop terminated before deriving one
    pub focus_area: Option<String>,
    pub terminal: bool,
    /// Failures between seal and the next run (seed promotion, latest copy, steering stages)
    #[serde(default)]
    pub failures: Vec<StageFailure>,
}

impl Steering {
    /// Non-terminal steering recorded when the loop stops before a focus area is derived
    pub fn without_focus(next_steps: impl Into<String>, failures: Vec<StageFailure>) -> Self {
        Self {
            next_steps: next_steps.into(),
            focus_area: None,
            terminal: false,
            failures,
        }
    }
}

/// Lifecycle of a run in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Opened, iterations may still be appended
    Open,
    /// Final artifacts recorded; immutable
    Sealed,
    /// A fatal error stopped the run
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Sealed | RunStatus::Aborted)
    }
}

/// One full run, assembled from ledger entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub context: RunContext,
    pub iterations: Vec<IterationRecord>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub final_artifacts: Option<FinalArtifacts>,
    pub aborted: Option<String>,
    pub steering: Option<Steering>,
}

impl RunRecord {
    pub fn status(&self) -> RunStatus {
        if self.aborted.is_some() {
            RunStatus::Aborted
        } else if self.final_artifacts.is_some() {
            RunStatus::Sealed
        } else {
            RunStatus::Open
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.status() == RunStatus::Sealed
    }

    /// The run proceeded without an interpreted intent
    pub fn intent_degraded(&self) -> bool {
        self.context.intent.is_none()
    }

    pub fn initial(&self) -> Option<&Artifact> {
        self.final_artifacts.as_ref().map(|f| &f.initial)
    }

    pub fn best(&self) -> Option<&Artifact> {
        self.final_artifacts.as_ref().map(|f| &f.best)
    }

    pub fn good_enough(&self) -> Option<&Artifact> {
        self.final_artifacts.as_ref().and_then(|f| f.good_enough.as_ref())
    }

    pub fn final_aggregate(&self) -> Option<&Artifact> {
        self.final_artifacts.as_ref().and_then(|f| f.final_aggregate.as_ref())
    }

    /// Wall-clock duration in seconds, once the run has ended
    pub fn duration_secs(&self) -> Option<f64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ArtifactKind;

    fn artifact(content: &str) -> Artifact {
        Artifact::new(ArtifactKind::Code, content)
    }

    fn run_record() -> RunRecord {
        RunRecord {
            id: "run-1".to_string(),
            context: RunContext::new("goal", ArtifactKind::Code, "seed.txt", 1),
            iterations: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            final_artifacts: None,
            aborted: None,
            steering: None,
        }
    }

    fn finals() -> FinalArtifacts {
        FinalArtifacts {
            initial: artifact("v0"),
            best: artifact("v1"),
            good_enough: None,
            good_enough_iteration: None,
            final_aggregate: None,
            final_rationale: None,
            failures: Vec::new(),
            documents: BTreeMap::new(),
        }
    }

    #[test]
    fn test_iteration_begin_carries_before() {
        let rec = IterationRecord::begin(1, artifact("v0"));
        assert_eq!(rec.before, rec.after);
        assert!(!rec.refined);
        assert!(!rec.is_failed());
        assert!(!rec.passed());
    }

    #[test]
    fn test_iteration_passed_reads_verdict() {
        let mut rec = IterationRecord::begin(1, artifact("v0"));
        rec.verdict = Some(Verdict {
            meets_requirements: true,
            rationale: "ok".to_string(),
        });
        assert!(rec.passed());
    }

    #[test]
    fn test_iteration_failed_stages() {
        let mut rec = IterationRecord::begin(2, artifact("v0"));
        rec.failures.push(StageFailure::from_error(
            Stage::Refine,
            &RefinrError::EmptyArtifact(Stage::Refine),
        ));
        assert!(rec.is_failed());
        assert_eq!(rec.failed_stages(), vec![Stage::Refine]);
        assert_eq!(rec.failures[0].kind, "empty_artifact");
    }

    #[test]
    fn test_run_status_transitions() {
        let mut run = run_record();
        assert_eq!(run.status(), RunStatus::Open);
        assert!(!run.status().is_terminal());

        run.final_artifacts = Some(finals());
        assert_eq!(run.status(), RunStatus::Sealed);
        assert!(run.is_sealed());
        assert_eq!(run.best().map(|a| a.content()), Some("v1"));
        assert_eq!(run.initial().map(|a| a.content()), Some("v0"));
        assert!(run.good_enough().is_none());

        run.aborted = Some("boom".to_string());
        assert_eq!(run.status(), RunStatus::Aborted);
        assert!(RunStatus::Aborted.is_terminal());
    }

    #[test]
    fn test_intent_degraded() {
        let run = run_record();
        assert!(run.intent_degraded());
    }

    #[test]
    fn test_duration_secs() {
        let mut run = run_record();
        assert!(run.duration_secs().is_none());
        run.ended_at = Some(run.started_at + chrono::Duration::milliseconds(1500));
        assert_eq!(run.duration_secs(), Some(1.5));
    }

    #[test]
    fn test_run_status_serialization() {
        assert_eq!(serde_json::to_string(&RunStatus::Sealed).unwrap(), "\"sealed\"");
        assert_eq!(serde_json::to_string(&RunStatus::Open).unwrap(), "\"open\"");
    }
}
