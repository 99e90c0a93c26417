//! Outer loop: run, steer, run again.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{Artifact, RunContext, RunRecord, Stage, StageFailure, Steering};
use crate::error::Result;
use crate::stages::is_terminal;

use super::RunPipeline;

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Stop after this many sealed runs
    pub max_runs: Option<u32>,
    /// Pause between runs
    pub run_delay: Duration,
    /// Overwrite the seed with each run's best artifact
    pub promote_best_to_seed: bool,
    /// Copy of the newest final artifact, refreshed after every run
    pub latest_artifact_path: Option<PathBuf>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_runs: None,
            run_delay: Duration::from_millis(5000),
            promote_best_to_seed: true,
            latest_artifact_path: None,
        }
    }
}

/// Why the outer loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverStop {
    /// Next steps came back empty or said there is nothing left to do
    Converged,
    /// `max_runs` reached
    MaxRuns,
    /// A run aborted or steering could not be derived
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct DriverOutcome {
    /// Sealed runs, oldest first
    pub runs: Vec<RunRecord>,
    pub stop: DriverStop,
}

impl DriverOutcome {
    pub fn last_sealed(&self) -> Option<&RunRecord> {
        self.runs.iter().rev().find(|r| r.is_sealed())
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.stop, DriverStop::Aborted(_))
    }
}

pub struct Driver {
    pipeline: RunPipeline,
    options: DriverOptions,
}

impl Driver {
    pub fn new(pipeline: RunPipeline, options: DriverOptions) -> Self {
        Self { pipeline, options }
    }

    pub fn pipeline(&self) -> &RunPipeline {
        &self.pipeline
    }

    /// Run until steering says stop, `max_runs` is reached, or something fatal happens.
    pub async fn run(&self, first: RunContext) -> DriverOutcome {
        let mut ctx = first;
        let mut runs: Vec<RunRecord> = Vec::new();

        if self.options.max_runs == Some(0) {
            log::info!("max_runs is 0; nothing to run");
            return DriverOutcome {
                runs,
                stop: DriverStop::MaxRuns,
            };
        }

        loop {
            let mut run = match self.pipeline.run_once(ctx).await {
                Ok(run) => run,
                Err(e) => return halt(runs, e.to_string()),
            };
            let Some(best) = run.best().cloned() else {
                let reason = format!("run {} sealed without a best artifact", run.id);
                runs.push(run);
                return halt(runs, reason);
            };

            let mut failures = Vec::new();
            if let Err(e) = self.publish(&run, &best, &mut failures) {
                let reason = format!("could not promote best artifact to seed: {}", e);
                failures.push(StageFailure::from_error(Stage::Persist, &e));
                return self.finish(
                    runs,
                    run,
                    Steering::without_focus(String::new(), failures),
                    DriverStop::Aborted(reason),
                );
            }

            let next_steps = match self.pipeline.stages().next_steps(&best, &run.context).await {
                Ok(text) => text,
                Err(e) => {
                    let reason = format!("deriving next steps failed: {}", e);
                    failures.push(StageFailure::from_error(Stage::NextSteps, &e));
                    return self.finish(
                        runs,
                        run,
                        Steering::without_focus(String::new(), failures),
                        DriverStop::Aborted(reason),
                    );
                }
            };

            if is_terminal(&next_steps) {
                log::info!("Run {} reported no more next steps", run.id);
                let steering = Steering {
                    next_steps,
                    focus_area: None,
                    terminal: true,
                    failures,
                };
                return self.finish(runs, run, steering, DriverStop::Converged);
            }

            if let Some(max) = self.options.max_runs
                && runs.len() as u32 + 1 >= max
            {
                log::info!("Reached max runs ({})", max);
                return self.finish(
                    runs,
                    run,
                    Steering::without_focus(next_steps, failures),
                    DriverStop::MaxRuns,
                );
            }

            let focus = match self.pipeline.stages().focus_area(&run.context, &next_steps).await {
                Ok(focus) => focus,
                Err(e) => {
                    let reason = format!("deriving focus area failed: {}", e);
                    failures.push(StageFailure::from_error(Stage::FocusArea, &e));
                    return self.finish(
                        runs,
                        run,
                        Steering::without_focus(next_steps, failures),
                        DriverStop::Aborted(reason),
                    );
                }
            };

            let steering = Steering {
                next_steps: next_steps.clone(),
                focus_area: Some(focus.clone()),
                terminal: false,
                failures,
            };
            ctx = run.context.successor(&run.id, focus.clone(), next_steps);
            if let Err(reason) = self.steer(&mut run, steering) {
                runs.push(run);
                return halt(runs, reason);
            }
            tracing::info!(run_id = %run.id, focus = %focus, "next run steered");
            runs.push(run);

            if !self.options.run_delay.is_zero() {
                tokio::time::sleep(self.options.run_delay).await;
            }
        }
    }

    /// Context for a process picking up where the ledger left off: the
    /// successor of the newest sealed run. Steering already recorded for that
    /// run is reused and anything missing is derived again from its best
    /// artifact. None when there is no sealed run or the last one converged.
    pub async fn resume_context(&self) -> Result<Option<RunContext>> {
        let runs = self.pipeline.ledger().list_runs()?;
        let Some(last) = runs.into_iter().rev().find(|r| r.is_sealed()) else {
            return Ok(None);
        };
        let steering = last.steering.clone().unwrap_or_default();
        if steering.terminal {
            log::info!("Run {} already converged; nothing to resume", last.id);
            return Ok(None);
        }

        let next_steps = if steering.next_steps.trim().is_empty() {
            let Some(best) = last.best() else {
                return Ok(None);
            };
            self.pipeline.stages().next_steps(best, &last.context).await?
        } else {
            steering.next_steps
        };
        if is_terminal(&next_steps) {
            return Ok(None);
        }

        let focus = match steering.focus_area {
            Some(focus) => focus,
            None => self.pipeline.stages().focus_area(&last.context, &next_steps).await?,
        };
        tracing::info!(run_id = %last.id, focus = %focus, "resuming after run");
        Ok(Some(last.context.successor(&last.id, focus, next_steps)))
    }

    /// Promote the best artifact to the seed and refresh the latest copy.
    /// A failed latest copy is collected into `failures`; a failed promotion
    /// is returned since the next run would start from a stale seed.
    fn publish(
        &self,
        run: &RunRecord,
        best: &Artifact,
        failures: &mut Vec<StageFailure>,
    ) -> Result<()> {
        let store = self.pipeline.artifacts();
        if self.options.promote_best_to_seed {
            store.write_plain(&run.context.seed_path, best.content())?;
        }
        if let Some(path) = &self.options.latest_artifact_path {
            let latest = run.final_aggregate().unwrap_or(best);
            if let Err(e) = store.write_plain(path, latest.content()) {
                log::warn!("Could not write latest artifact to {}: {}", path.display(), e);
                failures.push(StageFailure::from_error(Stage::Persist, &e));
            }
        }
        Ok(())
    }

    /// Append `steering` to the ledger and attach it to `run`
    fn steer(&self, run: &mut RunRecord, steering: Steering) -> std::result::Result<(), String> {
        self.pipeline
            .ledger()
            .record_steering(&run.id, &steering)
            .map_err(|e| format!("could not record steering: {}", e))?;
        run.steering = Some(steering);
        Ok(())
    }

    fn finish(
        &self,
        mut runs: Vec<RunRecord>,
        mut run: RunRecord,
        steering: Steering,
        stop: DriverStop,
    ) -> DriverOutcome {
        let recorded = self.steer(&mut run, steering);
        runs.push(run);
        match (recorded, stop) {
            (Err(reason), _) | (Ok(()), DriverStop::Aborted(reason)) => halt(runs, reason),
            (Ok(()), stop) => DriverOutcome { runs, stop },
        }
    }
}

fn halt(runs: Vec<RunRecord>, reason: String) -> DriverOutcome {
    log::error!("Driver halted: {}", reason);
    DriverOutcome {
        runs,
        stop: DriverStop::Aborted(reason),
    }
}
