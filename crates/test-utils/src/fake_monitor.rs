use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use probebench::errors::{ProbebenchError, Result};
use probebench::monitor::{Monitor, SampleBuffer, Timeline};
use serde_json::Value;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct Shared {
    buffer: SampleBuffer<i64>,
    runs: AtomicUsize,
    resets: AtomicUsize,
    stopped: AtomicBool,
    fail_reset: AtomicBool,
    fail_get: AtomicBool,
}

/// A monitor that spawns no process.
///
/// Samples are pushed by the test through a [`FakeMonitorHandle`]; `get`
/// turns whatever was pushed since the last reset into a single `value`
/// column.
#[derive(Debug)]
pub struct FakeMonitor {
    name: String,
    shared: Arc<Shared>,
}

/// Test-side view of a [`FakeMonitor`].
#[derive(Debug, Clone)]
pub struct FakeMonitorHandle {
    shared: Arc<Shared>,
}

impl FakeMonitor {
    pub fn new(name: &str) -> (Self, FakeMonitorHandle) {
        let shared = Arc::new(Shared::default());
        let handle = FakeMonitorHandle {
            shared: Arc::clone(&shared),
        };
        (
            Self {
                name: name.to_string(),
                shared,
            },
            handle,
        )
    }
}

impl FakeMonitorHandle {
    pub async fn push(&self, value: i64) {
        self.shared.buffer.push(value).await;
    }

    pub fn runs(&self) -> usize {
        self.shared.runs.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.shared.resets.load(Ordering::SeqCst)
    }

    pub fn was_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Make every following `reset` fail until turned off again.
    pub fn fail_reset(&self, fail: bool) {
        self.shared.fail_reset.store(fail, Ordering::SeqCst);
    }

    /// Make every following `get` fail until turned off again.
    pub fn fail_get(&self, fail: bool) {
        self.shared.fail_get.store(fail, Ordering::SeqCst);
    }
}

fn injected(what: &str) -> ProbebenchError {
    ProbebenchError::IoError(std::io::Error::other(format!("injected {what} failure")))
}

impl Monitor for FakeMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        stop: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.shared.runs.fetch_add(1, Ordering::SeqCst);
            // A dropped sender counts as a stop too.
            let _ = stop.await;
            self.shared.stopped.store(true, Ordering::SeqCst);
            Err(ProbebenchError::Stopped)
        })
    }

    fn reset(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.shared.resets.fetch_add(1, Ordering::SeqCst);
            if self.shared.fail_reset.load(Ordering::SeqCst) {
                return Err(injected("reset"));
            }
            self.shared.buffer.reset().await;
            Ok(())
        })
    }

    fn get(&self) -> Pin<Box<dyn Future<Output = Result<Timeline>> + Send + '_>> {
        Box::pin(async move {
            if self.shared.fail_get.load(Ordering::SeqCst) {
                return Err(injected("get"));
            }
            let mut timeline = Timeline::with_columns(vec!["value".to_string()]);
            for v in self.shared.buffer.drain().await {
                timeline.push_row(vec![Value::from(v)]);
            }
            Ok(timeline)
        })
    }
}
