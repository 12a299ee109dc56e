// src/monitor/mod.rs

//! Background samplers.
//!
//! A sampler runs one long-lived telemetry command for the whole experiment
//! and keeps what it reads in its own [`SampleBuffer`]. The orchestrator only
//! ever touches a sampler through the [`Monitor`] trait:
//!
//! - `run` drives the sampler until its stop signal fires;
//! - `reset` throws away everything sampled so far;
//! - `get` drains the buffer into a [`Timeline`].

use std::future::Future;
use std::pin::Pin;

use tokio::sync::oneshot;

use crate::errors::Result;

pub mod buffer;
pub mod csv_row;
pub mod table;
pub mod timeline;

pub use buffer::SampleBuffer;
pub use table::{RowKind, SampleBatcher, SamplingMode, TableFold, TableMonitor};
pub use timeline::Timeline;

/// Capability interface of a background sampler.
///
/// Production code uses [`TableMonitor`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait Monitor: Send + Sync {
    /// Name used as the key of this sampler's timeline in job records.
    fn name(&self) -> &str;

    /// Sample until `stop` fires.
    ///
    /// Returns [`crate::errors::ProbebenchError::Stopped`] once the stop
    /// signal has been honoured and the underlying process released.
    fn run(
        &self,
        stop: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    fn reset(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    fn get(&self) -> Pin<Box<dyn Future<Output = Result<Timeline>> + Send + '_>>;
}
