//! Loop controller.
//!
//! [`RunPipeline`] executes one run. [`Driver`] wraps it in the outer loop:
//! after each sealed run it derives next steps and a focus area from the
//! run's best artifact and starts the next run from them.

mod driver;
mod runner;

pub use driver::{Driver, DriverOptions, DriverOutcome, DriverStop};
pub use runner::RunPipeline;
