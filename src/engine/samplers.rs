// src/engine/samplers.rs

//! Lifetime management for the background sampler loops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::monitor::Monitor;

/// Internal handle for a running sampler loop.
///
/// - `cancel` requests a cooperative stop.
/// - `handle` is the Tokio task driving [`Monitor::run`].
struct ActiveSampler {
    name: String,
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<Result<()>>,
}

/// The set of sampler loops started for one orchestrator.
pub struct SamplerSet {
    active: Vec<ActiveSampler>,
}

impl SamplerSet {
    /// Start one Tokio task per monitor.
    pub fn spawn(monitors: &[Arc<dyn Monitor>]) -> Self {
        let active = monitors
            .iter()
            .map(|monitor| {
                let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
                let monitor = Arc::clone(monitor);
                let name = monitor.name().to_string();
                let handle = tokio::spawn(async move { monitor.run(cancel_rx).await });
                debug!(sampler = %name, "sampler task spawned");
                ActiveSampler {
                    name,
                    cancel: Some(cancel_tx),
                    handle,
                }
            })
            .collect::<Vec<_>>();

        info!(count = active.len(), "samplers started");
        Self { active }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Signal every sampler to stop, then wait up to `wait` for each one.
    ///
    /// The `Stopped` outcome is expected and only logged at debug level.
    /// Samplers that do not finish in time are aborted.
    pub async fn stop(mut self, wait: Duration) {
        for sampler in self.active.iter_mut() {
            if let Some(cancel) = sampler.cancel.take() {
                if cancel.send(()).is_err() {
                    debug!(sampler = %sampler.name, "sampler already finished while stopping");
                }
            }
        }

        for mut sampler in self.active.drain(..) {
            match timeout(wait, &mut sampler.handle).await {
                Ok(Ok(Ok(()))) => {
                    debug!(sampler = %sampler.name, "sampler finished");
                }
                Ok(Ok(Err(e))) if e.is_stopped() => {
                    debug!(sampler = %sampler.name, "sampler received stop signal");
                }
                Ok(Ok(Err(e))) => {
                    warn!(sampler = %sampler.name, error = %e, "sampler failed");
                }
                Ok(Err(join_err)) => {
                    warn!(
                        sampler = %sampler.name,
                        error = %join_err,
                        "sampler task panicked or was cancelled"
                    );
                }
                Err(_) => {
                    warn!(
                        sampler = %sampler.name,
                        wait_ms = wait.as_millis() as u64,
                        "sampler did not stop in time; aborting its task"
                    );
                    sampler.handle.abort();
                }
            }
        }
    }
}

impl std::fmt::Debug for SamplerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.active.iter().map(|s| s.name.as_str()).collect();
        f.debug_struct("SamplerSet").field("active", &names).finish()
    }
}
