//! Single-run pipeline.
//!
//! `run_once` interprets intent, generates the initial artifact, runs exactly
//! `iteration_budget` evaluate → critique → refine → clean → aggregate
//! iterations, then seals the run with its final artifacts. Stage failures
//! inside an iteration are recorded on the iteration and the run moves on;
//! only initial generation and ledger writes can stop a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::domain::{Artifact, FinalArtifacts, IterationRecord, RunContext, RunRecord, Stage, StageFailure};
use crate::error::{RefinrError, Result};
use crate::ledger::{RunLedger, render_receipt};
use crate::stages::{Stages, build_feedback};
use crate::storage::ArtifactStore;

/// What carries from one iteration to the next inside a run
struct RunState {
    initial: Artifact,
    best: Artifact,
    /// `before` of the previous iteration, for comparison
    previous: Artifact,
    good_enough: Option<Artifact>,
    good_enough_iteration: Option<u32>,
    initial_clean: Option<Artifact>,
    best_clean: Option<Artifact>,
}

impl RunState {
    fn new(initial: Artifact) -> Self {
        Self {
            best: initial.clone(),
            previous: initial.clone(),
            initial,
            good_enough: None,
            good_enough_iteration: None,
            initial_clean: None,
            best_clean: None,
        }
    }
}

pub struct RunPipeline {
    stages: Stages,
    ledger: Arc<RunLedger>,
    artifacts: Arc<dyn ArtifactStore>,
    runs_dir: PathBuf,
}

impl RunPipeline {
    pub fn new(
        stages: Stages,
        ledger: Arc<RunLedger>,
        artifacts: Arc<dyn ArtifactStore>,
        runs_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stages,
            ledger,
            artifacts,
            runs_dir: runs_dir.into(),
        }
    }

    pub fn stages(&self) -> &Stages {
        &self.stages
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    pub fn artifacts(&self) -> &dyn ArtifactStore {
        self.artifacts.as_ref()
    }

    /// Directory holding one run's persisted artifacts
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(run_id)
    }

    /// Execute one run and return its sealed record.
    pub async fn run_once(&self, ctx: RunContext) -> Result<RunRecord> {
        let mut run_failures = Vec::new();

        let intent = match self.stages.interpret_intent(&ctx.goal, &ctx.focus_area).await {
            Ok(intent) => Some(intent),
            Err(e) => {
                log::warn!("Intent interpretation failed, continuing without it: {}", e);
                run_failures.push(StageFailure::from_error(Stage::Interpret, &e));
                None
            }
        };
        let ctx = ctx.with_intent(intent);

        let run_id = self.ledger.open_run(&ctx)?;
        tracing::info!(
            run_id = %run_id,
            budget = ctx.iteration_budget,
            kind = %ctx.kind,
            degraded = ctx.intent.is_none(),
            "run started"
        );

        let seed = match self.artifacts.read_artifact(&ctx.seed_path) {
            Ok(seed) => seed,
            Err(e) => {
                return Err(self.abort(&run_id, format!("cannot read seed {}: {}", ctx.seed_path.display(), e)));
            }
        };

        let initial = match self.stages.generate(&ctx, &seed).await {
            Ok(initial) => initial,
            Err(e) => return Err(self.abort(&run_id, format!("initial generation failed: {}", e))),
        };

        let run_dir = self.run_dir(&run_id);
        let mut documents = BTreeMap::new();
        self.persist(&run_dir, "initial", initial.content(), &mut documents, &mut run_failures);

        let mut state = RunState::new(initial);
        for index in 1..=ctx.iteration_budget {
            let record = self.iterate(index, &ctx, &seed, &run_dir, &mut state).await;
            tracing::info!(
                run_id = %run_id,
                iteration = index,
                refined = record.refined,
                passed = record.passed(),
                failures = record.failures.len(),
                "iteration complete"
            );
            if let Err(e) = self.ledger.record_iteration(&run_id, &record) {
                return Err(self.abort(&run_id, format!("could not record iteration {}: {}", index, e)));
            }
        }

        let mut finals = self.finalize(&ctx, &run_dir, state, documents, run_failures).await;
        // The receipt goes out before the seal so a failed write is sealed with the run
        if let Err(e) = self.write_receipt(&run_id, &run_dir, &finals) {
            log::warn!("Could not write receipt for run {}: {}", run_id, e);
            finals.failures.push(StageFailure::from_error(Stage::Persist, &e));
        }
        if let Err(e) = self.ledger.seal_run(&run_id, &finals) {
            return Err(self.abort(&run_id, format!("could not seal run: {}", e)));
        }
        tracing::info!(run_id = %run_id, "run sealed");

        self.ledger.get_run(&run_id)
    }

    /// Render the receipt for the run as it will be sealed
    fn write_receipt(&self, run_id: &str, run_dir: &Path, finals: &FinalArtifacts) -> Result<()> {
        let mut run = self.ledger.get_run(run_id)?;
        run.final_artifacts = Some(finals.clone());
        run.ended_at = Some(Utc::now());
        self.artifacts.write_plain(&run_dir.join("receipt.md"), &render_receipt(&run))
    }

    async fn iterate(
        &self,
        index: u32,
        ctx: &RunContext,
        seed: &str,
        run_dir: &Path,
        state: &mut RunState,
    ) -> IterationRecord {
        let started = Instant::now();
        let before = state.best.clone();
        let mut record = IterationRecord::begin(index, before.clone());
        let mut failures = Vec::new();

        // 1. Evaluate the current best
        match self.stages.evaluate(&before, ctx).await {
            Ok(verdict) => {
                if verdict.meets_requirements && state.good_enough.is_none() {
                    log::info!("Iteration {} met requirements; keeping it as good enough", index);
                    state.good_enough = Some(before.clone());
                    state.good_enough_iteration = Some(index);
                }
                record.verdict = Some(verdict);
            }
            Err(e) => failures.push(StageFailure::from_error(Stage::Evaluate, &e)),
        }

        // 2. Critique
        match self.stages.suggest(&before, ctx).await {
            Ok(suggestions) => {
                record.suggestions = suggestions.items;
                record.critique = Some(suggestions.raw);
            }
            Err(e) => failures.push(StageFailure::from_error(Stage::Suggest, &e)),
        }
        match self.stages.check_discrepancies(seed, &before, ctx).await {
            Ok(discrepancy) => record.discrepancy = Some(discrepancy),
            Err(e) => failures.push(StageFailure::from_error(Stage::Discrepancy, &e)),
        }

        // 3. Refine
        match build_feedback(record.critique.as_deref(), record.discrepancy.as_deref()) {
            Some(feedback) => match self.stages.refine(&before, &feedback, ctx).await {
                Ok(after) => {
                    record.after = after;
                    record.refined = true;
                }
                Err(e) => failures.push(StageFailure::from_error(Stage::Refine, &e)),
            },
            None => failures.push(StageFailure::new(
                Stage::Refine,
                "generation_failed",
                "skipped: no critique available",
            )),
        }

        // 4. Compare against the best and the previous version
        match self.stages.compare(&record.after, &before, &state.previous, ctx).await {
            Ok(analysis) => record.analysis = Some(analysis),
            Err(e) => failures.push(StageFailure::from_error(Stage::Compare, &e)),
        }

        // 5. Clean and aggregate
        let cleaned = self.clean_or_keep(&record.after, &mut failures).await;
        let initial_clean = match state.initial_clean.clone() {
            Some(clean) => clean,
            None => {
                let clean = self.clean_or_keep(&state.initial, &mut failures).await;
                state.initial_clean = Some(clean.clone());
                clean
            }
        };
        let good_enough = state.good_enough.clone().unwrap_or_else(|| cleaned.clone());
        match self.stages.aggregate(&cleaned, &initial_clean, &good_enough, ctx).await {
            Ok(aggregate) => {
                record.aggregate = Some(aggregate.artifact);
                record.aggregate_rationale = Some(aggregate.rationale);
            }
            Err(e) => failures.push(StageFailure::from_error(Stage::Aggregate, &e)),
        }
        record.cleaned = Some(cleaned.clone());

        // 6. Persist what this iteration produced
        let dir = run_dir.join(format!("iteration_{}", index));
        let mut documents = BTreeMap::new();
        if let Some(verdict) = &record.verdict {
            self.persist(&dir, "evaluation", &verdict.rationale, &mut documents, &mut failures);
        }
        if let Some(critique) = &record.critique {
            self.persist(&dir, "suggestions", critique, &mut documents, &mut failures);
        }
        if let Some(discrepancy) = &record.discrepancy {
            self.persist(&dir, "discrepancy", discrepancy, &mut documents, &mut failures);
        }
        if record.refined {
            self.persist(&dir, "improved", record.after.content(), &mut documents, &mut failures);
        }
        if let Some(analysis) = &record.analysis {
            self.persist(&dir, "analysis", analysis, &mut documents, &mut failures);
        }
        self.persist(&dir, "cleaned", cleaned.content(), &mut documents, &mut failures);
        if let Some(aggregate) = &record.aggregate {
            self.persist(&dir, "aggregate", aggregate.content(), &mut documents, &mut failures);
        }

        for failure in &failures {
            log::warn!("Iteration {} {} failed: {}", index, failure.stage, failure.message);
        }

        record.documents = documents;
        record.failures = failures;
        record.duration_ms = started.elapsed().as_millis() as u64;

        state.previous = before;
        state.best = record.after.clone();
        state.best_clean = Some(cleaned);
        record
    }

    /// Build the run's final artifacts, including the seal-time aggregate.
    async fn finalize(
        &self,
        ctx: &RunContext,
        run_dir: &Path,
        state: RunState,
        mut documents: BTreeMap<String, String>,
        mut failures: Vec<StageFailure>,
    ) -> FinalArtifacts {
        let initial_clean = match state.initial_clean {
            Some(clean) => clean,
            None => self.clean_or_keep(&state.initial, &mut failures).await,
        };
        // With no iterations the best artifact is still the initial one
        let best_clean = state.best_clean.unwrap_or_else(|| initial_clean.clone());
        let good_enough = state.good_enough.clone().unwrap_or_else(|| best_clean.clone());

        let (final_aggregate, final_rationale) =
            match self.stages.aggregate(&best_clean, &initial_clean, &good_enough, ctx).await {
                Ok(aggregate) => (Some(aggregate.artifact), Some(aggregate.rationale)),
                Err(e) => {
                    log::warn!("Final aggregation failed: {}", e);
                    failures.push(StageFailure::from_error(Stage::Aggregate, &e));
                    (None, None)
                }
            };

        self.persist(run_dir, "best", state.best.content(), &mut documents, &mut failures);
        if let Some(good) = &state.good_enough {
            self.persist(run_dir, "good_enough", good.content(), &mut documents, &mut failures);
        }
        if let Some(aggregate) = &final_aggregate {
            self.persist(run_dir, "final_aggregate", aggregate.content(), &mut documents, &mut failures);
        }
        if let Some(rationale) = final_rationale.as_deref().filter(|r| !r.trim().is_empty()) {
            self.persist(run_dir, "final_rationale", rationale, &mut documents, &mut failures);
        }

        FinalArtifacts {
            initial: state.initial,
            best: state.best,
            good_enough: state.good_enough,
            good_enough_iteration: state.good_enough_iteration,
            final_aggregate,
            final_rationale,
            failures,
            documents,
        }
    }

    async fn clean_or_keep(&self, artifact: &Artifact, failures: &mut Vec<StageFailure>) -> Artifact {
        match self.stages.clean(artifact).await {
            Ok(cleaned) => cleaned,
            Err(e) => {
                failures.push(StageFailure::from_error(Stage::Clean, &e));
                artifact.clone()
            }
        }
    }

    /// Write `<dir>/<name>.txt`; a failed write is recorded, never fatal
    fn persist(
        &self,
        dir: &Path,
        name: &str,
        content: &str,
        documents: &mut BTreeMap<String, String>,
        failures: &mut Vec<StageFailure>,
    ) {
        let path = dir.join(format!("{}.txt", name));
        match self.artifacts.write_artifact(&path, content) {
            Ok(id) => {
                documents.insert(name.to_string(), id);
            }
            Err(e) => {
                log::warn!("Failed to persist {}: {}", path.display(), e);
                failures.push(StageFailure::from_error(Stage::Persist, &e));
            }
        }
    }

    /// Record the abort and build the error the caller returns
    fn abort(&self, run_id: &str, reason: String) -> RefinrError {
        tracing::warn!(run_id = %run_id, reason = %reason, "run aborted");
        if let Err(e) = self.ledger.abort_run(run_id, &reason) {
            log::error!("Could not record abort for run {}: {}", run_id, e);
        }
        RefinrError::RunAborted(reason)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::domain::{ArtifactKind, RunStatus};
    use crate::llm::{Backend, CompletionRequest, MockLlmClient};
    use crate::prompt::TemplateSet;
    use crate::storage::FsArtifactStore;

    fn respond(req: &CompletionRequest) -> Result<String> {
        let label = req.label.as_deref().unwrap_or("");
        let text = match label {
            "interpret" => "Reverse a string".to_string(),
            "generate" => "def rev(s): pass".to_string(),
            "evaluate" => "Not yet.\n{\"meets_requirements\": false}".to_string(),
            "suggest" => "1. Implement the body".to_string(),
            "discrepancy" => "Uses a different name".to_string(),
            "refine" => "def rev(s):\n    return s[::-1]".to_string(),
            "compare" => "New is better".to_string(),
            "clean" => "```python\ndef rev(s):\n    return s[::-1]\n```".to_string(),
            "aggregate" => "```python\ndef rev(s):\n    return s[::-1]\n```\nKept the slice.".to_string(),
            other => return Err(RefinrError::Llm(format!("unexpected stage {}", other))),
        };
        Ok(text)
    }

    fn pipeline(dir: &TempDir, mock: Arc<MockLlmClient>) -> RunPipeline {
        let stages = Stages::new(Backend::new(mock), TemplateSet::for_kind(ArtifactKind::Code).unwrap());
        let ledger = Arc::new(RunLedger::open(dir.path().join("ledger")).unwrap());
        let store = Arc::new(FsArtifactStore::new(dir.path()));
        RunPipeline::new(stages, ledger, store, dir.path().join("runs"))
    }

    fn context(dir: &TempDir, budget: u32) -> RunContext {
        let seed = dir.path().join("seed.py");
        fs::write(&seed, "def f(x): pass").unwrap();
        RunContext::new("write a function that reverses a string", ArtifactKind::Code, seed, budget)
            .with_domain("Python")
    }

    #[tokio::test]
    async fn test_run_once_persists_iteration_documents() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockLlmClient::with_responder(respond));
        let pipeline = pipeline(&dir, mock);

        let run = pipeline.run_once(context(&dir, 1)).await.unwrap();
        assert_eq!(run.status(), RunStatus::Sealed);

        let docs = &run.iterations[0].documents;
        for name in ["evaluation", "suggestions", "discrepancy", "improved", "analysis", "cleaned", "aggregate"] {
            assert!(docs.contains_key(name), "missing {}", name);
        }

        let improved = pipeline
            .artifacts()
            .read_artifact(&pipeline.run_dir(&run.id).join("iteration_1/improved.txt"))
            .unwrap();
        assert_eq!(improved, "def rev(s):\n    return s[::-1]");

        let finals = run.final_artifacts.as_ref().unwrap();
        assert!(finals.documents.contains_key("initial"));
        assert!(finals.documents.contains_key("best"));
        assert!(finals.documents.contains_key("final_aggregate"));
        assert!(pipeline.run_dir(&run.id).join("receipt.md").exists());
    }

    #[tokio::test]
    async fn test_intent_failure_is_degraded_not_fatal() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockLlmClient::with_responder(|req| {
            if req.label.as_deref() == Some("interpret") {
                return Err(RefinrError::Llm("down".to_string()));
            }
            respond(req)
        }));
        let pipeline = pipeline(&dir, mock);

        let run = pipeline.run_once(context(&dir, 1)).await.unwrap();
        assert!(run.is_sealed());
        assert!(run.intent_degraded());
        let failures = &run.final_artifacts.as_ref().unwrap().failures;
        assert_eq!(failures[0].stage, Stage::Interpret);
    }

    #[tokio::test]
    async fn test_missing_seed_aborts_run() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockLlmClient::with_responder(respond));
        let pipeline = pipeline(&dir, mock.clone());
        let ctx = RunContext::new("goal", ArtifactKind::Code, dir.path().join("missing.py"), 1);

        let err = pipeline.run_once(ctx).await.unwrap_err();
        assert!(matches!(err, RefinrError::RunAborted(_)));
        assert!(mock.requests_labeled("generate").is_empty());

        let runs = pipeline.ledger().list_runs().unwrap();
        assert_eq!(runs[0].status(), RunStatus::Aborted);
    }

    #[tokio::test]
    async fn test_critique_failure_skips_refinement() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockLlmClient::with_responder(|req| match req.label.as_deref() {
            Some("suggest") | Some("discrepancy") => Err(RefinrError::Llm("down".to_string())),
            _ => respond(req),
        }));
        let pipeline = pipeline(&dir, mock.clone());

        let run = pipeline.run_once(context(&dir, 1)).await.unwrap();
        let iteration = &run.iterations[0];
        assert!(!iteration.refined);
        assert_eq!(iteration.after, iteration.before);
        assert_eq!(
            iteration.failed_stages(),
            vec![Stage::Suggest, Stage::Discrepancy, Stage::Refine]
        );
        assert!(mock.requests_labeled("refine").is_empty());
    }

    #[tokio::test]
    async fn test_initial_is_cleaned_once_per_run() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockLlmClient::with_responder(respond));
        let pipeline = pipeline(&dir, mock.clone());

        pipeline.run_once(context(&dir, 3)).await.unwrap();
        // One per iteration plus the initial artifact once
        assert_eq!(mock.requests_labeled("clean").len(), 4);
        // One per iteration plus the seal-time aggregate
        assert_eq!(mock.requests_labeled("aggregate").len(), 4);
    }

    /// Filesystem store that refuses verbatim writes
    struct NoPlainWrites(FsArtifactStore);

    impl ArtifactStore for NoPlainWrites {
        fn write_artifact(&self, path: &Path, content: &str) -> Result<String> {
            self.0.write_artifact(path, content)
        }

        fn read_artifact(&self, path: &Path) -> Result<String> {
            self.0.read_artifact(path)
        }

        fn write_plain(&self, _path: &Path, _content: &str) -> Result<()> {
            Err(RefinrError::PersistenceFailed("read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_receipt_failure_is_sealed_with_run() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockLlmClient::with_responder(respond));
        let stages = Stages::new(Backend::new(mock), TemplateSet::for_kind(ArtifactKind::Code).unwrap());
        let ledger = Arc::new(RunLedger::open(dir.path().join("ledger")).unwrap());
        let store = Arc::new(NoPlainWrites(FsArtifactStore::new(dir.path())));
        let pipeline = RunPipeline::new(stages, ledger, store, dir.path().join("runs"));

        let run = pipeline.run_once(context(&dir, 1)).await.unwrap();
        assert!(run.is_sealed());
        assert!(!pipeline.run_dir(&run.id).join("receipt.md").exists());

        let failures = &run.final_artifacts.as_ref().unwrap().failures;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, Stage::Persist);
        assert!(failures[0].message.contains("read-only"));
    }
}
