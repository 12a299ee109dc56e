// src/experiment/mod.rs

//! Experiments: parameter sweeps over groups of commands, run against the
//! background samplers and written out as JSON.
//!
//! - `registry.rs`: [`Experiment`], [`ExperimentBody`] and the ordered
//!   [`ExperimentRegistry`].
//! - `context.rs`: [`ExperimentContext::shell`], which expands templates and
//!   runs one job per parameter combination.
//! - `runner.rs`: drives experiments and owns sampler start/stop.
//! - `report.rs`: experiment directory and result file naming.

pub mod context;
pub mod registry;
pub mod report;
pub mod runner;

pub use context::{ExperimentContext, expand_commands};
pub use registry::{Experiment, ExperimentBody, ExperimentRegistry, Step, StepBody};
pub use report::{
    ExperimentResult, create_experiment_dir, experiment_dir, timestamp_suffix, write_result,
};
pub use runner::ExperimentRunner;
