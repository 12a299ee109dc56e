// src/experiment/runner.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::engine::{DEFAULT_STOP_TIMEOUT, Interrupt, Orchestrator};
use crate::errors::{ProbebenchError, Result};
use crate::exec::DEFAULT_TERMINATE_GRACE;
use crate::experiment::context::ExperimentContext;
use crate::experiment::registry::Experiment;
use crate::experiment::report::{ExperimentResult, write_result};
use crate::monitor::{Monitor, TableMonitor};
use crate::parser::{OutputParser, PayloadParser};
use crate::sweep::format_params;

/// Runs experiments one after another against a shared set of samplers and
/// writes one result file per experiment into `exp_dir`.
pub struct ExperimentRunner {
    monitors: Vec<Arc<dyn Monitor>>,
    parser: Arc<dyn OutputParser>,
    terminate_grace: Duration,
    stop_timeout: Duration,
    exp_dir: PathBuf,
    interrupt: Interrupt,
}

impl ExperimentRunner {
    pub fn new(exp_dir: impl Into<PathBuf>) -> Self {
        Self {
            monitors: Vec::new(),
            parser: Arc::new(PayloadParser::default()),
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            exp_dir: exp_dir.into(),
            interrupt: Interrupt::never(),
        }
    }

    /// Samplers, payload tag and timing from a validated config.
    pub fn from_config(cfg: &ConfigFile, exp_dir: impl Into<PathBuf>) -> Result<Self> {
        let grace = cfg.config.terminate_grace();
        let monitors = cfg
            .sampler
            .iter()
            .map(|s| {
                Arc::new(TableMonitor::new(&s.name, &s.cmd, s.mode).with_terminate_grace(grace))
                    as Arc<dyn Monitor>
            })
            .collect();
        let parser = PayloadParser::new(&cfg.config.payload_tag)?;

        Ok(Self::new(exp_dir)
            .with_monitors(monitors)
            .with_parser(Arc::new(parser))
            .with_terminate_grace(grace)
            .with_stop_timeout(cfg.config.stop_timeout()))
    }

    pub fn with_monitors(mut self, monitors: Vec<Arc<dyn Monitor>>) -> Self {
        self.monitors = monitors;
        self
    }

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

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn exp_dir(&self) -> &Path {
        &self.exp_dir
    }

    /// Run `experiments` in order, stopping at the first failure.
    pub async fn run_all(&self, experiments: &[&Experiment]) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(experiments.len());
        for exp in experiments {
            written.push(self.run(exp).await?);
        }
        Ok(written)
    }

    /// Run one experiment and write its result file.
    ///
    /// Samplers run for the whole experiment. If the body fails or the run
    /// is interrupted, the jobs completed so far are still written and the
    /// samplers are stopped before the error is returned.
    pub async fn run(&self, exp: &Experiment) -> Result<PathBuf> {
        let mut orchestrator = Orchestrator::new(self.monitors.clone())
            .with_parser(Arc::clone(&self.parser))
            .with_terminate_grace(self.terminate_grace)
            .with_stop_timeout(self.stop_timeout)
            .with_interrupt(self.interrupt.clone());
        orchestrator.start_samplers();

        let mut ctx = ExperimentContext::new(orchestrator, exp.cmd_params().clone());
        let mut outcome = Ok(());
        for params in exp.params().iter() {
            if self.interrupt.is_fired() {
                outcome = Err(ProbebenchError::Interrupted);
                break;
            }
            info!(
                "{} started to run with params {}",
                exp.name(),
                format_params(&params)
            );
            ctx.set_func_params(params);
            let res = self.run_body(exp, &mut ctx).await;
            let res = match res {
                Ok(()) if self.interrupt.is_fired() => Err(ProbebenchError::Interrupted),
                other => other,
            };
            match res {
                Ok(()) => {}
                Err(e) if e.is_interrupted() => {
                    warn!(experiment = exp.name(), "experiment interrupted");
                    outcome = Err(e);
                    break;
                }
                Err(e) => {
                    error!(experiment = exp.name(), error = %e, "experiment failed");
                    outcome = Err(e);
                    break;
                }
            }
        }

        let mut orchestrator = ctx.into_orchestrator();
        orchestrator.stop_samplers().await;
        debug!(experiment = exp.name(), "samplers stopped");

        let result = ExperimentResult {
            exp_item: exp.name().to_string(),
            result: orchestrator.into_history(),
        };
        let path = write_result(&self.exp_dir, &result)?;
        info!(path = %path.display(), "{} finished.", exp.name());

        outcome.map(|()| path)
    }

    /// One body invocation. On interrupt the body gets a bounded window to
    /// wind down its running job before it is abandoned.
    async fn run_body(&self, exp: &Experiment, ctx: &mut ExperimentContext) -> Result<()> {
        let mut body = exp.body().run(ctx);
        tokio::select! {
            res = &mut body => res,
            () = self.interrupt.fired() => {
                let window = self.terminate_grace.saturating_add(self.stop_timeout);
                match tokio::time::timeout(window, &mut body).await {
                    Ok(res) => res,
                    Err(_) => {
                        warn!(
                            experiment = exp.name(),
                            window_ms = window.as_millis() as u64,
                            "experiment body did not stop after interrupt; abandoning it"
                        );
                        Err(ProbebenchError::Interrupted)
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for ExperimentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentRunner")
            .field(
                "monitors",
                &self.monitors.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("terminate_grace", &self.terminate_grace)
            .field("stop_timeout", &self.stop_timeout)
            .field("exp_dir", &self.exp_dir)
            .field("interrupted", &self.interrupt.is_fired())
            .finish()
    }
}
