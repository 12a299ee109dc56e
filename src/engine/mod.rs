// src/engine/mod.rs

//! Job orchestration.
//!
//! This module ties together:
//! - the process launcher for foreground commands
//! - the background samplers and their start/stop lifecycle
//! - the per-job state machine and the append-only job history
//! - the run-wide interrupt fired on Ctrl-C
//!
//! The orchestrator itself lives in [`orchestrator`]; sampler task handles
//! are managed by [`samplers`].

pub mod interrupt;
pub mod job;
pub mod orchestrator;
pub mod samplers;

pub use interrupt::{Interrupt, InterruptHandle, interrupt_channel};
pub use job::{JobPhase, JobRecord};
pub use orchestrator::{DEFAULT_STOP_TIMEOUT, Orchestrator};
pub use samplers::SamplerSet;
