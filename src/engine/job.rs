// src/engine/job.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::exec::LaunchOutput;
use crate::monitor::Timeline;

/// Where the orchestrator is in the lifecycle of the current job.
///
/// `Idle -> Reset -> Running -> Draining -> Complete`, then back to `Reset`
/// for the next job. A job that fails in any phase drops back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobPhase {
    #[default]
    Idle,
    /// Sampler buffers are being cleared.
    Reset,
    /// Foreground commands are running.
    Running,
    /// Sampler buffers are being drained into timelines.
    Draining,
    /// The job record has been appended to the history.
    Complete,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Idle => "idle",
            JobPhase::Reset => "reset",
            JobPhase::Running => "running",
            JobPhase::Draining => "draining",
            JobPhase::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// One finished job: the commands, what they printed, and the telemetry
/// sampled while they ran. Immutable once appended to the history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: u64,
    pub commands: Vec<String>,
    /// One entry per command, in command order.
    pub outputs: Vec<LaunchOutput>,
    /// Sampler name -> timeline.
    pub telemetry: BTreeMap<String, Timeline>,
}

impl JobRecord {
    pub fn output(&self, proc_id: usize) -> Option<&LaunchOutput> {
        self.outputs.get(proc_id)
    }

    pub fn timeline(&self, sampler: &str) -> Option<&Timeline> {
        self.telemetry.get(sampler)
    }
}
