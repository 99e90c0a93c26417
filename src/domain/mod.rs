//! Domain types for Refinr
//!
//! This module contains all core domain types:
//! - Artifact: an immutable text blob (code or document) produced by a stage
//! - Stage: the pipeline stages, used to tag requests, failures and logs
//! - RunContext: the frozen inputs threaded through one run
//! - IterationRecord / RunRecord: what the ledger keeps for audit

pub mod artifact;
pub mod context;
pub mod record;
pub mod stage;

pub use artifact::{Artifact, ArtifactKind};
pub use context::RunContext;
pub use record::{FinalArtifacts, IterationRecord, RunRecord, RunStatus, StageFailure, Steering, Verdict};
pub use stage::Stage;
