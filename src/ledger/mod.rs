//! Run Ledger - append-only record of every run.
//!
//! A run is a sequence of entries spread over five JSONL collections:
//! `runs` (opened), `iterations`, `seals`, `aborts` and `steering`. Nothing
//! is ever rewritten. [`RunLedger::get_run`] folds the entries back into a
//! [`RunRecord`] in the order they were appended.

mod receipt;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use receipt::render_receipt;

use crate::domain::{FinalArtifacts, IterationRecord, RunContext, RunRecord, RunStatus, Steering};
use crate::error::{RefinrError, Result};
use crate::id::{generate_iteration_id, generate_run_id};
use crate::storage::{AppendStore, Filter, HasId, JsonlStorage};

const RUNS: &str = "runs";
const ITERATIONS: &str = "iterations";
const SEALS: &str = "seals";
const ABORTS: &str = "aborts";
const STEERING: &str = "steering";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunOpened {
    id: String,
    context: RunContext,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IterationEntry {
    id: String,
    run_id: String,
    record: IterationRecord,
}

/// Seal, abort and steering entries are keyed by run id, so each can be
/// appended at most once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunSealed {
    id: String,
    ended_at: DateTime<Utc>,
    final_artifacts: FinalArtifacts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunAbortedEntry {
    id: String,
    ended_at: DateTime<Utc>,
    reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SteeringEntry {
    id: String,
    recorded_at: DateTime<Utc>,
    steering: Steering,
}

macro_rules! impl_has_id {
    ($($ty:ty),*) => {
        $(impl HasId for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })*
    };
}

impl_has_id!(RunOpened, IterationEntry, RunSealed, RunAbortedEntry, SteeringEntry);

/// Any storage error surfaces as PersistenceFailed
fn persist(e: RefinrError) -> RefinrError {
    match e {
        RefinrError::PersistenceFailed(_) => e,
        other => RefinrError::PersistenceFailed(other.to_string()),
    }
}

pub struct RunLedger {
    store: JsonlStorage,
    /// Serializes check-then-append sequences
    write_lock: Mutex<()>,
}

impl RunLedger {
    /// Open (or create) a ledger in `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let store = JsonlStorage::new(dir.as_ref()).map_err(persist)?;
        Ok(Self {
            store,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        self.store.base_path()
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| RefinrError::PersistenceFailed(format!("ledger lock poisoned: {}", e)))
    }

    fn status(&self, run_id: &str) -> Result<RunStatus> {
        let opened: Option<RunOpened> = self.store.get(RUNS, run_id).map_err(persist)?;
        if opened.is_none() {
            return Err(RefinrError::RunNotFound(run_id.to_string()));
        }
        let aborted: Option<RunAbortedEntry> = self.store.get(ABORTS, run_id).map_err(persist)?;
        if aborted.is_some() {
            return Ok(RunStatus::Aborted);
        }
        let sealed: Option<RunSealed> = self.store.get(SEALS, run_id).map_err(persist)?;
        if sealed.is_some() {
            return Ok(RunStatus::Sealed);
        }
        Ok(RunStatus::Open)
    }

    fn require_open(&self, run_id: &str, action: &str) -> Result<()> {
        match self.status(run_id)? {
            RunStatus::Open => Ok(()),
            status => Err(RefinrError::InvalidState(format!(
                "cannot {} run {}: run is {:?}",
                action, run_id, status
            ))),
        }
    }

    fn iterations(&self, run_id: &str) -> Result<Vec<IterationRecord>> {
        let entries: Vec<IterationEntry> = self
            .store
            .query(ITERATIONS, &[Filter::eq("run_id", run_id)])
            .map_err(persist)?;
        Ok(entries.into_iter().map(|e| e.record).collect())
    }

    /// Start a new run and return its id
    pub fn open_run(&self, context: &RunContext) -> Result<String> {
        let _guard = self.guard()?;
        let id = generate_run_id();
        let entry = RunOpened {
            id: id.clone(),
            context: context.clone(),
            started_at: Utc::now(),
        };
        self.store.create(RUNS, &entry).map_err(persist)?;
        log::info!("Opened run {}", id);
        Ok(id)
    }

    /// Append an iteration. Indices must be contiguous from 1.
    pub fn record_iteration(&self, run_id: &str, record: &IterationRecord) -> Result<()> {
        let _guard = self.guard()?;
        self.require_open(run_id, "record iteration for")?;

        let expected = self.iterations(run_id)?.len() as u32 + 1;
        if record.index != expected {
            return Err(RefinrError::InvalidState(format!(
                "run {} expects iteration {} next, got {}",
                run_id, expected, record.index
            )));
        }

        let entry = IterationEntry {
            id: generate_iteration_id(run_id, record.index),
            run_id: run_id.to_string(),
            record: record.clone(),
        };
        self.store.create(ITERATIONS, &entry).map_err(persist)?;
        log::debug!("Recorded iteration {} for run {}", record.index, run_id);
        Ok(())
    }

    /// Record final artifacts. The run is immutable afterwards.
    pub fn seal_run(&self, run_id: &str, final_artifacts: &FinalArtifacts) -> Result<()> {
        let _guard = self.guard()?;
        self.require_open(run_id, "seal")?;
        let entry = RunSealed {
            id: run_id.to_string(),
            ended_at: Utc::now(),
            final_artifacts: final_artifacts.clone(),
        };
        self.store.create(SEALS, &entry).map_err(persist)?;
        log::info!("Sealed run {}", run_id);
        Ok(())
    }

    /// Mark a run as stopped by a fatal error. It will never be sealed.
    pub fn abort_run(&self, run_id: &str, reason: &str) -> Result<()> {
        let _guard = self.guard()?;
        self.require_open(run_id, "abort")?;
        let entry = RunAbortedEntry {
            id: run_id.to_string(),
            ended_at: Utc::now(),
            reason: reason.to_string(),
        };
        self.store.create(ABORTS, &entry).map_err(persist)?;
        log::warn!("Aborted run {}: {}", run_id, reason);
        Ok(())
    }

    /// Record what the driver decided after a sealed run
    pub fn record_steering(&self, run_id: &str, steering: &Steering) -> Result<()> {
        let _guard = self.guard()?;
        match self.status(run_id)? {
            RunStatus::Sealed => {}
            status => {
                return Err(RefinrError::InvalidState(format!(
                    "cannot record steering for run {}: run is {:?}",
                    run_id, status
                )));
            }
        }
        let entry = SteeringEntry {
            id: run_id.to_string(),
            recorded_at: Utc::now(),
            steering: steering.clone(),
        };
        self.store.create(STEERING, &entry).map_err(persist)
    }

    /// Assemble a run from its entries
    pub fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        let opened: RunOpened = self
            .store
            .get(RUNS, run_id)
            .map_err(persist)?
            .ok_or_else(|| RefinrError::RunNotFound(run_id.to_string()))?;
        self.assemble(opened)
    }

    fn assemble(&self, opened: RunOpened) -> Result<RunRecord> {
        let run_id = opened.id.as_str();
        let iterations = self.iterations(run_id)?;
        let sealed: Option<RunSealed> = self.store.get(SEALS, run_id).map_err(persist)?;
        let aborted: Option<RunAbortedEntry> = self.store.get(ABORTS, run_id).map_err(persist)?;
        let steering: Option<SteeringEntry> = self.store.get(STEERING, run_id).map_err(persist)?;

        let ended_at = sealed
            .as_ref()
            .map(|s| s.ended_at)
            .or_else(|| aborted.as_ref().map(|a| a.ended_at));

        Ok(RunRecord {
            id: opened.id,
            context: opened.context,
            iterations,
            started_at: opened.started_at,
            ended_at,
            final_artifacts: sealed.map(|s| s.final_artifacts),
            aborted: aborted.map(|a| a.reason),
            steering: steering.map(|s| s.steering),
        })
    }

    /// Every run, oldest first
    pub fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let opened: Vec<RunOpened> = self.store.list(RUNS).map_err(persist)?;
        opened.into_iter().map(|o| self.assemble(o)).collect()
    }
}

impl std::fmt::Debug for RunLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLedger").field("dir", &self.dir()).finish()
    }
}
