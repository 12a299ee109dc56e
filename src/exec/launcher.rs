// src/exec/launcher.rs

//! Spawn one shell command and capture both output streams line by line.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::errors::{ProbebenchError, Result};
use crate::parser::OutputParser;

use super::observer::{BoxedObserver, LineObserver};
use super::record::{LaunchOutput, LineRecord, Stream, Termination};
use super::terminate::{DEFAULT_TERMINATE_GRACE, terminate};

/// What to run and how to watch it.
pub struct LaunchSpec {
    pub cmd: String,
    pub stdout_observer: Option<BoxedObserver>,
    pub stderr_observer: Option<BoxedObserver>,
    /// Upper bound on the combined read + wait time.
    pub timeout: Option<Duration>,
    /// Keep captured lines in the returned [`LaunchOutput`]. Long-lived
    /// samplers turn this off and rely on their observers alone.
    pub retain_lines: bool,
}

impl LaunchSpec {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            stdout_observer: None,
            stderr_observer: None,
            timeout: None,
            retain_lines: true,
        }
    }

    pub fn stdout_observer(mut self, observer: impl LineObserver + 'static) -> Self {
        self.stdout_observer = Some(Box::new(observer));
        self
    }

    pub fn stderr_observer(mut self, observer: impl LineObserver + 'static) -> Self {
        self.stderr_observer = Some(Box::new(observer));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retain_lines(mut self, retain: bool) -> Self {
        self.retain_lines = retain;
        self
    }
}

impl std::fmt::Debug for LaunchSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchSpec")
            .field("cmd", &self.cmd)
            .field("stdout_observer", &self.stdout_observer.is_some())
            .field("stderr_observer", &self.stderr_observer.is_some())
            .field("timeout", &self.timeout)
            .field("retain_lines", &self.retain_lines)
            .finish()
    }
}

/// Anything that can run to completion and hand back captured output.
pub trait Launcher: Send {
    fn get(&mut self) -> Pin<Box<dyn Future<Output = Result<LaunchOutput>> + Send + '_>>;

    /// [`Launcher::get`] followed by `parser`.
    fn get_parsed<'a>(
        &'a mut self,
        parser: &'a dyn OutputParser,
    ) -> Pin<Box<dyn Future<Output = Result<LaunchOutput>> + Send + 'a>> {
        Box::pin(async move {
            let output = self.get().await?;
            Ok(parser.parse(output))
        })
    }
}

/// Runs its command through the platform shell.
///
/// A timeout or a fired stop signal is not an error: the process is
/// terminated and the lines captured so far are returned, with
/// [`LaunchOutput::termination`] saying why it ended.
#[derive(Debug)]
pub struct ShellLauncher {
    spec: LaunchSpec,
    stop: Option<oneshot::Receiver<()>>,
    terminate_grace: Duration,
}

impl ShellLauncher {
    pub fn new(spec: LaunchSpec) -> Self {
        Self {
            spec,
            stop: None,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
        }
    }

    /// Stop the next launch early when `stop` fires (or its sender is
    /// dropped).
    pub fn with_stop(mut self, stop: oneshot::Receiver<()>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    pub fn cmd(&self) -> &str {
        &self.spec.cmd
    }

    async fn launch(&mut self) -> Result<LaunchOutput> {
        let cmd_text = self.spec.cmd.clone();

        let mut cmd = shell_command(&cmd_text);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| ProbebenchError::Spawn {
            cmd: cmd_text.clone(),
            source,
        })?;
        debug!(cmd = %cmd_text, pid = ?child.id(), "process spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut stdout_observer = self.spec.stdout_observer.take();
        let mut stderr_observer = self.spec.stderr_observer.take();
        let mut stdout_lines = Vec::new();
        let mut stderr_lines = Vec::new();
        let stop = self.stop.take();
        let retain = self.spec.retain_lines;

        let termination = tokio::select! {
            status = async {
                tokio::join!(
                    read_stream(stdout, Stream::Stdout, stdout_observer.as_mut(), &mut stdout_lines, retain),
                    read_stream(stderr, Stream::Stderr, stderr_observer.as_mut(), &mut stderr_lines, retain),
                );
                child.wait().await
            } => {
                let status = status?;
                debug!(cmd = %cmd_text, exit_code = ?status.code(), "process exited");
                Termination::Exited(status.code())
            }

            _ = sleep_or_forever(self.spec.timeout) => {
                warn!(
                    cmd = %cmd_text,
                    timeout_ms = self.spec.timeout.map(|t| t.as_millis() as u64),
                    "command timed out; terminating"
                );
                Termination::TimedOut
            }

            _ = stop_requested(stop) => {
                debug!(cmd = %cmd_text, "stop requested; terminating");
                Termination::Stopped
            }
        };

        if !matches!(termination, Termination::Exited(_)) {
            terminate(&mut child, self.terminate_grace, &cmd_text).await;
        }

        for observer in [stdout_observer.as_mut(), stderr_observer.as_mut()]
            .into_iter()
            .flatten()
        {
            observer.finish().await;
        }

        self.spec.stdout_observer = stdout_observer;
        self.spec.stderr_observer = stderr_observer;

        if !retain {
            stdout_lines.clear();
            stderr_lines.clear();
        }

        Ok(LaunchOutput {
            cmd: cmd_text,
            stdout: stdout_lines,
            stderr: stderr_lines,
            termination,
        })
    }
}

impl Launcher for ShellLauncher {
    fn get(&mut self) -> Pin<Box<dyn Future<Output = Result<LaunchOutput>> + Send + '_>> {
        Box::pin(self.launch())
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(cmd_text: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_text);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_text);
        c
    }
}

/// Read `pipe` until EOF, recording every line and feeding the observer.
///
/// Lines are decoded lossily and trailing whitespace is trimmed. With
/// `retain` off, `out` only ever holds the line being observed.
async fn read_stream<R>(
    pipe: Option<R>,
    stream: Stream,
    mut observer: Option<&mut BoxedObserver>,
    out: &mut Vec<LineRecord>,
    retain: bool,
) where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return;
    };

    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf).trim_end().to_string();
                if !retain {
                    out.clear();
                }
                out.push(LineRecord::now(text));
                if let (Some(obs), Some(record)) = (observer.as_mut(), out.last()) {
                    obs.observe(record).await;
                }
            }
            Err(e) => {
                warn!(%stream, error = %e, "error reading output stream; giving up on it");
                break;
            }
        }
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(t) => tokio::time::sleep(t).await,
        None => std::future::pending().await,
    }
}

async fn stop_requested(stop: Option<oneshot::Receiver<()>>) {
    match stop {
        Some(rx) => {
            if rx.await.is_err() {
                debug!("stop sender dropped; treating as stop request");
            }
        }
        None => std::future::pending().await,
    }
}
