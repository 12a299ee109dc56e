// src/exec/observer.rs

//! Per-line observers attached to a launched command's output streams.
//!
//! The launcher awaits the observer for each line before it reads the next
//! line of the same stream, so a slow observer applies back-pressure to its
//! own stream only.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use super::record::{LineRecord, Stream};

/// Callback invoked for every captured line of one stream.
pub trait LineObserver: Send {
    fn observe<'a>(
        &'a mut self,
        line: &'a LineRecord,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

    /// Called once after the stream is done: closed, timed out or stopped.
    fn finish(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(std::future::ready(()))
    }
}

/// Plain synchronous closures are observers too.
impl<F> LineObserver for F
where
    F: FnMut(&LineRecord) + Send,
{
    fn observe<'a>(
        &'a mut self,
        line: &'a LineRecord,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        (self)(line);
        Box::pin(std::future::ready(()))
    }
}

/// Boxed observer as stored in a [`super::LaunchSpec`].
pub type BoxedObserver = Box<dyn LineObserver>;

/// Logs every line of a foreground command tagged with its job and process
/// index.
pub struct JobLineLogger {
    job_id: u64,
    proc_id: usize,
    stream: Stream,
    cmd_prefix: String,
}

/// How much of the command is shown in each log line.
const CMD_PREFIX_CHARS: usize = 20;
/// How much of each output line is shown.
const LINE_PREFIX_CHARS: usize = 100;

impl JobLineLogger {
    pub fn new(job_id: u64, proc_id: usize, stream: Stream, cmd: &str) -> Self {
        Self {
            job_id,
            proc_id,
            stream,
            cmd_prefix: cmd.chars().take(CMD_PREFIX_CHARS).collect(),
        }
    }
}

impl LineObserver for JobLineLogger {
    fn observe<'a>(
        &'a mut self,
        line: &'a LineRecord,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        let shown: String = line.text.trim().chars().take(LINE_PREFIX_CHARS).collect();
        info!(
            job = self.job_id,
            proc = self.proc_id,
            stream = %self.stream,
            "{}: '{}'",
            self.cmd_prefix,
            shown
        );
        Box::pin(std::future::ready(()))
    }
}
