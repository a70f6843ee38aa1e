//! Container supervision.
//!
//! The child is created by `clone(2)` directly into new PID, mount, UTS and
//! network namespaces. It is PID 1 of its own namespace and cannot learn its
//! host PID, so the parent attaches it to its cgroup and writes the PID
//! record while the child waits on a socket pair. The parent then releases
//! the child, which sets its hostname, isolates its root and execs.
//!
//! The child reports setup errors back on the same socket. Its end is
//! close-on-exec, so end-of-file without a message means exec succeeded.

use std::ffi::CString;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;

use bantubox_common::constants::SETUP_FAILURE_EXIT_CODE;
use bantubox_common::error::{BantuboxError, Result};
use bantubox_core::cgroup::{CgroupController, CgroupEntry};
use bantubox_core::namespace::{self, NamespaceConfig};
use nix::errno::Errno;
use nix::sys::signal::{SigHandler, SigSet, SigmaskHow, Signal, kill, sigprocmask};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use crate::container::ContainerSpec;
use crate::state::ContainerRegistry;

/// Stack handed to the cloned child. It only runs setup code before exec.
const STACK_SIZE: usize = 1024 * 1024;

/// Byte the parent sends once the child may proceed.
const RELEASE: u8 = 1;

/// How a supervised process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal exit with a status code.
    Exited(i32),
    /// Killed by a signal.
    Signaled(Signal),
}

impl ExitStatus {
    /// Shell-style exit code: the status itself, or `128 + signal`.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Signaled(signal) => 128 + signal as i32,
        }
    }
}

/// Creates the isolated child for one container and waits for it.
#[derive(Debug)]
pub struct Supervisor<'a> {
    registry: &'a ContainerRegistry,
    cgroups: &'a CgroupController,
}

impl<'a> Supervisor<'a> {
    /// Creates a supervisor that records PIDs in `registry` and attaches
    /// children through `cgroups`.
    #[must_use]
    pub fn new(registry: &'a ContainerRegistry, cgroups: &'a CgroupController) -> Self {
        Self { registry, cgroups }
    }

    /// Runs `spec` to completion.
    ///
    /// The image template must already be materialized and the registry
    /// entry created.
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::ProcessSpawnFailure`] if the child cannot be
    /// created or waited for, [`BantuboxError::CgroupSetupFailure`] if it
    /// cannot be attached, or [`BantuboxError::ContainerSetupFailure`] if it
    /// failed to isolate itself. In every error case the child has been
    /// reaped and the user command never ran.
    pub fn run(&self, spec: &ContainerSpec) -> Result<ExitStatus> {
        let argv = command_argv(spec.command())?;
        let (parent, child) = UnixStream::pair().map_err(spawn_failure)?;

        let pid = self.spawn(spec, &argv, &child, parent.as_raw_fd())?;
        drop(child);
        tracing::info!(id = %spec.id(), %pid, "container process created");

        if let Err(e) = self.register(spec, pid) {
            abort_child(pid);
            return Err(e);
        }
        if let Err(e) = (&parent).write_all(&[RELEASE]) {
            abort_child(pid);
            return Err(spawn_failure(e));
        }

        let report = read_report(&parent);
        drop(parent);
        let status = wait_for(pid)?;

        if let Some(message) = report {
            tracing::warn!(id = %spec.id(), %message, "container setup failed");
            return Err(BantuboxError::ContainerSetupFailure {
                id: spec.id().to_string(),
                message,
            });
        }

        tracing::info!(id = %spec.id(), %pid, code = status.code(), "container exited");
        Ok(status)
    }

    fn spawn(&self, spec: &ContainerSpec, argv: &[CString], channel: &UnixStream, parent_fd: RawFd) -> Result<Pid> {
        let mut stack = vec![0u8; STACK_SIZE];
        let template = spec.image().template.as_path();
        let callback = Box::new(|| child_main(spec, template, argv, channel, parent_fd));

        // SAFETY: the runtime is single-threaded at this point, and the child
        // only runs setup code before exec or `_exit`.
        let pid = unsafe {
            nix::sched::clone(
                callback,
                &mut stack,
                NamespaceConfig::default().clone_flags(),
                Some(Signal::SIGCHLD as i32),
            )
        }
        .map_err(|e| spawn_failure(e.into()))?;
        Ok(pid)
    }

    fn register(&self, spec: &ContainerSpec, pid: Pid) -> Result<CgroupEntry> {
        let entry = self.cgroups.attach(spec.id(), pid, spec.limits())?;
        self.registry.write_pid(spec.id(), pid)?;
        Ok(entry)
    }
}

/// Entry point of the cloned child. Never returns: it either becomes the
/// user command or exits with [`SETUP_FAILURE_EXIT_CODE`].
fn child_main(
    spec: &ContainerSpec,
    template: &Path,
    argv: &[CString],
    channel: &UnixStream,
    parent_fd: RawFd,
) -> isize {
    // SAFETY: `parent_fd` is this process's copy of the parent's end; it
    // must not keep the channel open once the parent is gone.
    let _ = unsafe { libc::close(parent_fd) };

    let mut release = [0u8; 1];
    if matches!((&*channel).read(&mut release), Ok(1)) {
        let Err(error) = isolate_and_exec(spec, template, argv);
        let _ = (&*channel).write_all(error.to_string().as_bytes());
    }
    // SAFETY: `_exit` skips atexit handlers and stdio flushing, which belong
    // to the parent's copy of the address space.
    unsafe { libc::_exit(SETUP_FAILURE_EXIT_CODE) }
}

fn isolate_and_exec(spec: &ContainerSpec, template: &Path, argv: &[CString]) -> Result<std::convert::Infallible> {
    namespace::uts::set_hostname(spec.id().as_str())?;
    let _ = namespace::mount::isolate_root(spec.entry_dir(), template)?;
    reset_signals()?;
    nix::unistd::execvp(&argv[0], argv).map_err(|e| BantuboxError::ProcessSpawnFailure { source: e.into() })
}

/// Gives the command default signal handling. The Rust runtime ignores
/// SIGPIPE, and ignored dispositions survive exec.
fn reset_signals() -> Result<()> {
    let failure = |e: Errno| BantuboxError::ProcessSpawnFailure { source: e.into() };
    // SAFETY: no handler is installed, only the default disposition.
    let _ = unsafe { nix::sys::signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) }.map_err(failure)?;
    sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None).map_err(failure)
}

fn command_argv(command: &[String]) -> Result<Vec<CString>> {
    if command.is_empty() {
        return Err(BantuboxError::Config {
            message: "no command given".into(),
        });
    }
    command
        .iter()
        .map(|arg| {
            CString::new(arg.as_str()).map_err(|_| BantuboxError::Config {
                message: format!("command argument {arg:?} contains a NUL byte"),
            })
        })
        .collect()
}

/// Reads the child's report until end-of-file. `None` means exec succeeded.
fn read_report(mut channel: &UnixStream) -> Option<String> {
    let mut buf = Vec::new();
    if let Err(e) = channel.read_to_end(&mut buf) {
        tracing::warn!(error = %e, "failed to read container setup report");
    }
    if buf.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&buf).into_owned())
    }
}

fn wait_for(pid: Pid) -> Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus::Exited(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(ExitStatus::Signaled(signal)),
            Ok(_) | Err(Errno::EINTR) => {}
            Err(e) => return Err(spawn_failure(e.into())),
        }
    }
}

/// Kills and reaps a child that must not be released.
fn abort_child(pid: Pid) {
    if let Err(e) = kill(pid, Signal::SIGKILL) {
        tracing::warn!(%pid, error = %e, "failed to kill container process");
    }
    if let Err(e) = wait_for(pid) {
        tracing::warn!(%pid, error = %e, "failed to reap container process");
    }
}

const fn spawn_failure(source: std::io::Error) -> BantuboxError {
    BantuboxError::ProcessSpawnFailure { source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_of_normal_exit() {
        assert_eq!(ExitStatus::Exited(0).code(), 0);
        assert_eq!(ExitStatus::Exited(3).code(), 3);
    }

    #[test]
    fn exit_code_of_signal_is_offset_by_128() {
        assert_eq!(ExitStatus::Signaled(Signal::SIGKILL).code(), 137);
        assert_eq!(ExitStatus::Signaled(Signal::SIGTERM).code(), 143);
    }

    #[test]
    fn argv_rejects_interior_nul() {
        assert!(matches!(
            command_argv(&["/bin/echo".into(), "a\0b".into()]),
            Err(BantuboxError::Config { .. })
        ));
    }

    #[test]
    fn argv_preserves_order() {
        let argv = command_argv(&["/bin/echo".into(), "hello".into()]).expect("argv");
        assert_eq!(argv[0].to_str().expect("utf8"), "/bin/echo");
        assert_eq!(argv[1].to_str().expect("utf8"), "hello");
    }

    #[test]
    fn reset_signals_restores_default_sigpipe() {
        use nix::sys::wait::WaitStatus;
        use nix::unistd::{ForkResult, fork};

        // SAFETY: the child only calls async-signal-safe functions before
        // `_exit`.
        match unsafe { fork() }.expect("fork") {
            ForkResult::Child => {
                let ok = unsafe { nix::sys::signal::signal(Signal::SIGPIPE, SigHandler::SigIgn) }.is_ok()
                    && reset_signals().is_ok()
                    && unsafe { nix::sys::signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) }
                        .is_ok_and(|previous| matches!(previous, SigHandler::SigDfl));
                unsafe { libc::_exit(i32::from(!ok)) }
            }
            ForkResult::Parent { child } => {
                assert_eq!(waitpid(child, None).expect("waitpid"), WaitStatus::Exited(child, 0));
            }
        }
    }

    #[test]
    fn report_is_none_on_clean_eof() {
        let (reader, writer) = UnixStream::pair().expect("pair");
        drop(writer);
        assert_eq!(read_report(&reader), None);
    }

    #[test]
    fn report_carries_child_message() {
        let (reader, mut writer) = UnixStream::pair().expect("pair");
        writer.write_all(b"overlay mount failed").expect("write");
        drop(writer);
        assert_eq!(read_report(&reader).as_deref(), Some("overlay mount failed"));
    }
}
