//! Refinr - iterative refinement pipeline for generated artifacts
//!
//! A run interprets the goal, generates an initial artifact from a seed
//! example, then evaluates, critiques, refines and aggregates it for a fixed
//! number of iterations. An outer driver turns each run's best artifact into
//! next steps and a focus area for the following run.

pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod ledger;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod stages;
pub mod storage;

pub use error::{RefinrError, Result};
