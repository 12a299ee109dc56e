// src/exec/terminate.rs

//! Graceful-then-forced termination of a launched process.
//!
//! Commands are spawned in their own process group on unix, so the
//! terminate signal also reaches anything the shell started.

use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default time a process gets to exit after the terminate signal.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Ask `child` to exit, wait up to `grace`, then kill it.
///
/// Never fails: problems are logged. A process that survives the kill may be
/// left behind as a zombie.
pub async fn terminate(child: &mut Child, grace: Duration, cmd: &str) {
    // `id()` is gone once the child is reaped; keep it for the group.
    let pid = child.id();

    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(cmd, ?status, "process already exited; nothing to terminate");
            signal_group(child, pid, GroupSignal::Kill);
            return;
        }
        Ok(None) => {}
        Err(e) => {
            warn!(cmd, error = %e, "failed to query process state before terminating");
        }
    }

    signal_group(child, pid, GroupSignal::Terminate);

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(cmd, ?status, "process exited after terminate request");
            // Leftover members of the group, if any.
            signal_group(child, pid, GroupSignal::Kill);
        }
        Ok(Err(e)) => {
            warn!(cmd, error = %e, "failed waiting for process after terminate request");
        }
        Err(_) => {
            warn!(
                cmd,
                grace_ms = grace.as_millis() as u64,
                "process ignored terminate request; killing"
            );
            signal_group(child, pid, GroupSignal::Kill);
            if let Err(e) = child.kill().await {
                warn!(
                    cmd,
                    error = %e,
                    "failed to kill process; it may be left running as a zombie"
                );
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(_child: &mut Child, pid: Option<u32>, sig: GroupSignal) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };
    let signal = match sig {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    // The child leads its own group, so pgid == pid.
    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, ?signal, error = %e, "failed to signal process group"),
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _pid: Option<u32>, sig: GroupSignal) {
    if let GroupSignal::Terminate = sig {
        if let Err(e) = child.start_kill() {
            debug!(error = %e, "start_kill failed");
        }
    }
}
