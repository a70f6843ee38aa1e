//! Cgroup resource management.
//!
//! The host exposes one of two incompatible interfaces. The unified
//! hierarchy (cgroups v2) is recognised by `cgroup.controllers` at the
//! cgroup root and uses `cgroup.procs`, `cpu.weight` and `memory.max`. The
//! legacy hierarchy (cgroups v1) has one mount per controller under the
//! root and uses `tasks`, `cpu.shares` and `memory.limit_in_bytes`. Unified
//! wins when both are visible.
//!
//! Every container gets its own group under the runtime-owned `bantubox`
//! scope. Failures are hard errors: an unapplied limit is never skipped.

pub mod cpu;
pub mod memory;

use std::fmt;
use std::path::{Path, PathBuf};

use bantubox_common::constants::CGROUP_SCOPE;
use bantubox_common::error::{BantuboxError, Result};
use bantubox_common::types::{ContainerId, ResourceLimits};
use nix::unistd::Pid;

/// The cgroup interface present on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupVersion {
    /// One hierarchy per controller (cgroups v1).
    Legacy,
    /// Single unified hierarchy (cgroups v2).
    Unified,
}

impl CgroupVersion {
    /// Detects the interface mounted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::CgroupSetupFailure`] if neither a unified
    /// root nor a legacy `cpu` controller is present.
    pub fn detect(root: &Path) -> Result<Self> {
        if root.join("cgroup.controllers").is_file() {
            Ok(Self::Unified)
        } else if root.join("cpu").is_dir() {
            Ok(Self::Legacy)
        } else {
            Err(BantuboxError::CgroupSetupFailure {
                path: root.to_path_buf(),
                message: "no cgroup hierarchy with a CPU controller is mounted".into(),
            })
        }
    }

    /// File a PID is written to in order to join a group.
    #[must_use]
    pub const fn membership_file(self) -> &'static str {
        match self {
            Self::Legacy => "tasks",
            Self::Unified => "cgroup.procs",
        }
    }
}

impl fmt::Display for CgroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "v1"),
            Self::Unified => write!(f, "v2"),
        }
    }
}

/// Controllers a container may be limited by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    /// CPU weight/shares.
    Cpu,
    /// Memory and swap.
    Memory,
}

impl Controller {
    const fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
        }
    }
}

/// The groups a container was attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupEntry {
    /// Group directories the process joined.
    pub groups: Vec<PathBuf>,
    /// Attached PID.
    pub pid: Pid,
    /// Value written to the CPU limit file, if a limit was requested.
    pub cpu_value: Option<u64>,
}

/// Creates per-container groups and applies limits on the detected
/// interface.
#[derive(Debug, Clone)]
pub struct CgroupController {
    root: PathBuf,
    version: CgroupVersion,
}

impl CgroupController {
    /// Detects the interface under `root` (normally `/sys/fs/cgroup`).
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::CgroupSetupFailure`] if no usable hierarchy
    /// is mounted.
    pub fn detect(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let version = CgroupVersion::detect(&root)?;
        tracing::debug!(root = %root.display(), %version, "cgroup interface detected");
        Ok(Self { root, version })
    }

    /// Returns the detected interface.
    #[must_use]
    pub const fn version(&self) -> CgroupVersion {
        self.version
    }

    /// Returns the runtime-owned parent scope for `controller`.
    #[must_use]
    pub fn scope_dir(&self, controller: Controller) -> PathBuf {
        match self.version {
            CgroupVersion::Unified => self.root.join(CGROUP_SCOPE),
            CgroupVersion::Legacy => self.root.join(controller.name()).join(CGROUP_SCOPE),
        }
    }

    /// Returns the group directory of `id` for `controller`.
    #[must_use]
    pub fn group_path(&self, controller: Controller, id: &ContainerId) -> PathBuf {
        self.scope_dir(controller).join(id.as_str())
    }

    /// Attaches `pid` to the groups of `id` and applies `limits`.
    ///
    /// The CPU group is always joined; limit files are only written for
    /// limits that are set (`cpu_shares == 0` writes nothing).
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::CgroupSetupFailure`] if `pid` is not alive,
    /// a required controller is not mounted, or any directory or file
    /// write fails.
    pub fn attach(&self, id: &ContainerId, pid: Pid, limits: &ResourceLimits) -> Result<CgroupEntry> {
        if !crate::process::is_alive(pid) {
            return Err(BantuboxError::CgroupSetupFailure {
                path: self.group_path(Controller::Cpu, id),
                message: format!("process {pid} does not exist"),
            });
        }

        let mut entry = CgroupEntry {
            groups: Vec::new(),
            pid,
            cpu_value: None,
        };

        match self.version {
            CgroupVersion::Unified => {
                let mut enable = vec![Controller::Cpu];
                if limits.memory.is_some() {
                    enable.push(Controller::Memory);
                }
                let group = self.prepare_unified_group(id, &enable)?;
                self.join(&group, pid)?;
                self.apply(&group, limits, &mut entry)?;
                entry.groups.push(group);
            }
            CgroupVersion::Legacy => {
                let group = self.prepare_legacy_group(Controller::Cpu, id)?;
                self.join(&group, pid)?;
                if limits.cpu_shares != 0 {
                    entry.cpu_value = Some(cpu::set_cpu_limit(&group, self.version, limits.cpu_shares)?);
                }
                entry.groups.push(group);

                if let Some(memory) = &limits.memory {
                    let group = self.prepare_legacy_group(Controller::Memory, id)?;
                    self.join(&group, pid)?;
                    memory::set_memory_limit(&group, self.version, memory)?;
                    entry.groups.push(group);
                }
            }
        }

        tracing::info!(id = %id, %pid, groups = entry.groups.len(), "process attached to cgroup");
        Ok(entry)
    }

    /// Removes every group that belongs to `id`. Missing groups are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::CgroupSetupFailure`] if a group still holds
    /// processes or cannot be removed.
    pub fn remove(&self, id: &ContainerId) -> Result<()> {
        let mut groups = vec![self.group_path(Controller::Cpu, id)];
        if self.version == CgroupVersion::Legacy {
            groups.push(self.group_path(Controller::Memory, id));
        }
        for group in groups.iter().filter(|g| g.exists()) {
            std::fs::remove_dir(group).map_err(|e| setup_failure(group, &e))?;
            tracing::info!(path = %group.display(), "cgroup removed");
        }
        Ok(())
    }

    fn prepare_unified_group(&self, id: &ContainerId, enable: &[Controller]) -> Result<PathBuf> {
        let scope = self.scope_dir(Controller::Cpu);
        enable_controllers(&self.root, enable)?;
        create_group(&scope)?;
        enable_controllers(&scope, enable)?;
        let group = scope.join(id.as_str());
        create_group(&group)?;
        Ok(group)
    }

    fn prepare_legacy_group(&self, controller: Controller, id: &ContainerId) -> Result<PathBuf> {
        let base = self.root.join(controller.name());
        if !base.is_dir() {
            return Err(BantuboxError::CgroupSetupFailure {
                path: base,
                message: format!("{} controller is not mounted", controller.name()),
            });
        }
        let group = self.group_path(controller, id);
        create_group(&group)?;
        Ok(group)
    }

    fn join(&self, group: &Path, pid: Pid) -> Result<()> {
        write_control_file(&group.join(self.version.membership_file()), &pid.to_string())?;
        tracing::debug!(group = %group.display(), %pid, "joined cgroup");
        Ok(())
    }

    fn apply(&self, group: &Path, limits: &ResourceLimits, entry: &mut CgroupEntry) -> Result<()> {
        if limits.cpu_shares != 0 {
            entry.cpu_value = Some(cpu::set_cpu_limit(group, self.version, limits.cpu_shares)?);
        }
        if let Some(memory) = &limits.memory {
            memory::set_memory_limit(group, self.version, memory)?;
        }
        Ok(())
    }
}

fn enable_controllers(dir: &Path, controllers: &[Controller]) -> Result<()> {
    let control = dir.join("cgroup.subtree_control");
    for controller in controllers {
        write_control_file(&control, &format!("+{}", controller.name()))?;
    }
    Ok(())
}

/// Creates a group directory; one that already exists is fine.
fn create_group(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| setup_failure(path, &e))
}

fn write_control_file(path: &Path, value: &str) -> Result<()> {
    std::fs::write(path, value).map_err(|e| setup_failure(path, &e))
}

fn setup_failure(path: &Path, e: &std::io::Error) -> BantuboxError {
    BantuboxError::CgroupSetupFailure {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
