// src/engine/orchestrator.rs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::errors::{ProbebenchError, Result};
use crate::exec::{
    DEFAULT_TERMINATE_GRACE, JobLineLogger, LaunchSpec, Launcher, ShellLauncher, Stream,
};
use crate::monitor::Monitor;
use crate::parser::{OutputParser, PayloadParser};

use super::interrupt::Interrupt;
use super::job::{JobPhase, JobRecord};
use super::samplers::SamplerSet;

/// Default bound on how long stopping the samplers may take.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs jobs against a fixed set of background samplers.
///
/// Each call to [`Orchestrator::shell`] is one job:
/// reset every sampler, run all commands concurrently, drain every sampler,
/// append a [`JobRecord`] to the history.
pub struct Orchestrator {
    monitors: Vec<Arc<dyn Monitor>>,
    parser: Arc<dyn OutputParser>,
    samplers: Option<SamplerSet>,
    history: Vec<JobRecord>,
    next_job_id: u64,
    phase: JobPhase,
    terminate_grace: Duration,
    stop_timeout: Duration,
    interrupt: Interrupt,
}

impl Orchestrator {
    pub fn new(monitors: Vec<Arc<dyn Monitor>>) -> Self {
        Self {
            monitors,
            parser: Arc::new(PayloadParser::default()),
            samplers: None,
            history: Vec::new(),
            next_job_id: 0,
            phase: JobPhase::Idle,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            interrupt: Interrupt::never(),
        }
    }

    /// Parser applied to every foreground command's output.
    pub fn with_parser(mut self, parser: Arc<dyn OutputParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    pub fn with_stop_timeout(mut self, wait: Duration) -> Self {
        self.stop_timeout = wait;
        self
    }

    /// Once `interrupt` fires, running commands are terminated and no new
    /// job starts.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn history(&self) -> &[JobRecord] {
        &self.history
    }

    pub fn into_history(self) -> Vec<JobRecord> {
        self.history
    }

    pub fn sampler_names(&self) -> Vec<&str> {
        self.monitors.iter().map(|m| m.name()).collect()
    }

    pub fn samplers_running(&self) -> bool {
        self.samplers.is_some()
    }

    /// Start the long-lived sampler loops. No-op if already started.
    pub fn start_samplers(&mut self) {
        if self.samplers.is_some() {
            warn!("samplers already running; ignoring start request");
            return;
        }
        self.samplers = Some(SamplerSet::spawn(&self.monitors));
    }

    /// Stop the sampler loops and wait (bounded) for them to release their
    /// processes.
    pub async fn stop_samplers(&mut self) {
        match self.samplers.take() {
            Some(set) => {
                debug!(count = set.len(), "stopping samplers");
                set.stop(self.stop_timeout).await;
            }
            None => debug!("no samplers running"),
        }
    }

    /// Run one job: every command in `cmds` concurrently, each bounded by
    /// `timeout`.
    ///
    /// A command that times out contributes its partial output; only a
    /// spawn failure (or a failing sampler reset or drain) fails the job.
    /// A job interrupted while running is still recorded, with its commands
    /// marked stopped. After an interrupt no new job starts.
    pub async fn shell(
        &mut self,
        cmds: &[String],
        timeout: Option<Duration>,
    ) -> Result<&JobRecord> {
        let job_id = self.next_job_id;
        if self.interrupt.is_fired() {
            info!(job = job_id, "interrupted; not starting job");
            return Err(ProbebenchError::Interrupted);
        }

        self.enter(JobPhase::Reset, job_id);
        for monitor in &self.monitors {
            if let Err(e) = monitor.reset().await {
                self.phase = JobPhase::Idle;
                return Err(e);
            }
        }

        self.enter(JobPhase::Running, job_id);
        info!(job = job_id, ?cmds, "launched");
        let outputs = match self.run_commands(job_id, cmds, timeout).await {
            Ok(outputs) => outputs,
            Err(e) => {
                self.phase = JobPhase::Idle;
                return Err(e);
            }
        };

        self.enter(JobPhase::Draining, job_id);
        let mut telemetry = BTreeMap::new();
        for monitor in &self.monitors {
            match monitor.get().await {
                Ok(timeline) => {
                    telemetry.insert(monitor.name().to_string(), timeline);
                }
                Err(e) => {
                    self.phase = JobPhase::Idle;
                    return Err(e);
                }
            }
        }

        let record = JobRecord {
            id: job_id,
            commands: cmds.to_vec(),
            outputs,
            telemetry,
        };
        let idx = self.history.len();
        self.history.push(record);
        self.next_job_id += 1;
        self.enter(JobPhase::Complete, job_id);

        Ok(&self.history[idx])
    }

    async fn run_commands(
        &self,
        job_id: u64,
        cmds: &[String],
        timeout: Option<Duration>,
    ) -> Result<Vec<crate::exec::LaunchOutput>> {
        let handles: Vec<_> = cmds
            .iter()
            .enumerate()
            .map(|(proc_id, cmd)| {
                let spec = LaunchSpec::new(cmd.clone())
                    .stdout_observer(JobLineLogger::new(job_id, proc_id, Stream::Stdout, cmd))
                    .stderr_observer(JobLineLogger::new(job_id, proc_id, Stream::Stderr, cmd))
                    .timeout(timeout);
                let (stop_tx, stop_rx) = oneshot::channel();
                let mut launcher = ShellLauncher::new(spec)
                    .with_terminate_grace(self.terminate_grace)
                    .with_stop(stop_rx);
                let parser = Arc::clone(&self.parser);
                let interrupt = self.interrupt.clone();
                tokio::spawn(async move {
                    let mut run = launcher.get_parsed(parser.as_ref());
                    tokio::select! {
                        output = &mut run => output,
                        () = interrupt.fired() => {
                            debug!(job = job_id, proc = proc_id, "interrupted; stopping command");
                            let _ = stop_tx.send(());
                            run.await
                        }
                    }
                })
            })
            .collect();

        // Wait for every command, even after a failure, so nothing is left
        // running behind the job.
        let mut outputs = Vec::with_capacity(handles.len());
        let mut first_err: Option<ProbebenchError> = None;
        for (proc_id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(Ok(output)) => {
                    if output.timed_out() {
                        info!(
                            job = job_id,
                            proc = proc_id,
                            "command timed out; keeping partial output"
                        );
                    }
                    outputs.push(output);
                }
                Ok(Err(e)) => {
                    error!(job = job_id, proc = proc_id, error = %e, "command failed");
                    first_err.get_or_insert(e);
                }
                Err(join_err) => {
                    error!(
                        job = job_id,
                        proc = proc_id,
                        error = %join_err,
                        "command task panicked"
                    );
                    first_err.get_or_insert(anyhow::Error::from(join_err).into());
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(outputs),
        }
    }

    fn enter(&mut self, phase: JobPhase, job_id: u64) {
        debug!(job = job_id, from = %self.phase, to = %phase, "job phase");
        self.phase = phase;
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("samplers", &self.sampler_names())
            .field("running", &self.samplers.is_some())
            .field("jobs", &self.history.len())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
