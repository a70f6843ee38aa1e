//! Process liveness and signalling by PID.

use bantubox_common::error::{BantuboxError, Result};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

/// Returns whether a process with `pid` exists.
///
/// Uses the null signal; `EPERM` still proves the process exists.
#[must_use]
pub fn is_alive(pid: Pid) -> bool {
    match kill(pid, None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Sends `signal` to `pid`. A process that has already exited is not an
/// error.
///
/// # Errors
///
/// Returns [`BantuboxError::ProcessSignalFailure`] for any other failure.
pub fn send_signal(pid: Pid, signal: Signal) -> Result<()> {
    match kill(pid, signal) {
        Ok(()) => {
            tracing::debug!(%pid, ?signal, "signal sent");
            Ok(())
        }
        Err(Errno::ESRCH) => {
            tracing::debug!(%pid, ?signal, "process already gone");
            Ok(())
        }
        Err(e) => Err(BantuboxError::ProcessSignalFailure {
            pid: pid.as_raw(),
            source: e.into(),
        }),
    }
}
