//! Linux namespace management for container isolation.
//!
//! Namespaces are requested at process-creation time through `clone(2)`
//! flags; this module decides which ones and drives the setup that runs
//! inside them.

pub mod mount;
pub mod uts;

use nix::sched::CloneFlags;

/// Configuration for which namespaces a container process is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate PID namespace.
    pub pid: bool,
    /// Isolate mount namespace.
    pub mount: bool,
    /// Isolate UTS (hostname) namespace.
    pub uts: bool,
    /// Isolate network namespace.
    pub network: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            pid: true,
            mount: true,
            uts: true,
            network: true,
        }
    }
}

impl NamespaceConfig {
    /// Returns the `clone(2)` flags creating the configured namespaces.
    #[must_use]
    pub fn clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        flags.set(CloneFlags::CLONE_NEWPID, self.pid);
        flags.set(CloneFlags::CLONE_NEWNS, self.mount);
        flags.set(CloneFlags::CLONE_NEWUTS, self.uts);
        flags.set(CloneFlags::CLONE_NEWNET, self.network);
        flags
    }
}
