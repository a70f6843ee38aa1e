//! On-disk container registry.
//!
//! Each container is a directory `<container_dir>/<id>/`; its existence is
//! the container's identity and there is no separate index. The directory
//! holds the overlay layers, the PID record and `config.json`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bantubox_common::constants::{KILL_TIMEOUT_SECS, METADATA_FILE, PID_FILE};
use bantubox_common::error::{BantuboxError, Result};
use bantubox_common::types::{ContainerId, ContainerState};
use bantubox_core::cgroup::CgroupController;
use bantubox_core::process;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::container::ContainerMetadata;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One container as reported by [`ContainerRegistry::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Directory name, normally a UUID.
    pub id: String,
    /// Liveness of the recorded PID.
    pub state: ContainerState,
    /// Recorded PID, if any.
    pub pid: Option<Pid>,
    /// Contents of `config.json`, if present and readable.
    pub metadata: Option<ContainerMetadata>,
}

/// Directory-per-container store used outside of `run`.
#[derive(Debug, Clone)]
pub struct ContainerRegistry {
    container_dir: PathBuf,
    cgroups: Option<CgroupController>,
}

impl ContainerRegistry {
    /// Creates a registry over `container_dir`. Nothing is touched on disk.
    #[must_use]
    pub fn new(container_dir: impl Into<PathBuf>) -> Self {
        Self {
            container_dir: container_dir.into(),
            cgroups: None,
        }
    }

    /// Removes container cgroups through `cgroups` when entries are torn
    /// down.
    #[must_use]
    pub fn with_cgroups(mut self, cgroups: CgroupController) -> Self {
        self.cgroups = Some(cgroups);
        self
    }

    /// Returns the container directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.container_dir
    }

    /// Returns `<container_dir>/<id>`.
    #[must_use]
    pub fn entry_dir(&self, id: &ContainerId) -> PathBuf {
        self.container_dir.join(id.as_str())
    }

    /// Creates the entry directory for a new container.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory exists or cannot be created.
    pub fn create(&self, id: &ContainerId) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.container_dir)
            .map_err(|e| BantuboxError::io(&self.container_dir, e))?;
        let dir = self.entry_dir(id);
        std::fs::create_dir(&dir).map_err(|e| BantuboxError::io(&dir, e))?;
        tracing::debug!(id = %id, path = %dir.display(), "registry entry created");
        Ok(dir)
    }

    /// Records the supervised process's host PID.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the record cannot be written.
    pub fn write_pid(&self, id: &ContainerId, pid: Pid) -> Result<()> {
        let path = self.entry_dir(id).join(PID_FILE);
        std::fs::write(&path, pid.to_string()).map_err(|e| BantuboxError::io(&path, e))
    }

    /// Writes `config.json` into the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_metadata(&self, metadata: &ContainerMetadata) -> Result<()> {
        let path = self.entry_dir(&metadata.id).join(METADATA_FILE);
        let json = serde_json::to_string_pretty(metadata)?;
        std::fs::write(&path, json).map_err(|e| BantuboxError::io(&path, e))
    }

    /// Lists every subdirectory of the container directory, sorted by id.
    /// A missing container directory means no containers.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<RegistryEntry>> {
        let entries = match std::fs::read_dir(&self.container_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BantuboxError::io(&self.container_dir, e)),
        };

        let mut containers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BantuboxError::io(&self.container_dir, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            containers.push(describe(id, &path));
        }
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(containers)
    }

    /// Stops a container and removes every trace of it.
    ///
    /// Sends SIGTERM, waits up to `grace` for the process to exit, then
    /// escalates to SIGKILL. Only once the process is gone are the cgroup
    /// and the entry directory removed. A process that already exited is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::ContainerNotFound`] if the entry is absent,
    /// [`BantuboxError::ProcessSignalFailure`] if the process survives
    /// SIGKILL, or an I/O error if removal fails.
    pub fn stop(&self, id: &ContainerId, grace: Duration) -> Result<()> {
        let dir = self.existing_entry(id)?;
        if let Some(pid) = read_pid_file(&dir.join(PID_FILE))? {
            terminate(pid, grace)?;
        }
        self.remove(id, &dir)?;
        tracing::info!(id = %id, "container stopped");
        Ok(())
    }

    /// Deletes a container's entry.
    ///
    /// A live container is refused unless `force` is set, in which case it
    /// is stopped first with `grace` as the SIGTERM window.
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::ContainerNotFound`] if the entry is absent,
    /// [`BantuboxError::ContainerRunning`] if the process is alive and
    /// `force` is not set, or an I/O error if removal fails.
    pub fn delete(&self, id: &ContainerId, force: bool, grace: Duration) -> Result<()> {
        let dir = self.existing_entry(id)?;
        if let Some(pid) = read_pid_file(&dir.join(PID_FILE))?.filter(|pid| process::is_alive(*pid)) {
            if !force {
                return Err(BantuboxError::ContainerRunning {
                    id: id.to_string(),
                    pid: pid.as_raw(),
                });
            }
            terminate(pid, grace)?;
        }
        self.remove(id, &dir)?;
        tracing::info!(id = %id, "container deleted");
        Ok(())
    }

    /// Removes the cgroup and the entry directory of `id`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the entry directory cannot be removed.
    pub fn discard(&self, id: &ContainerId) -> Result<()> {
        let dir = self.entry_dir(id);
        if !dir.exists() {
            return Ok(());
        }
        self.remove(id, &dir)
    }

    fn existing_entry(&self, id: &ContainerId) -> Result<PathBuf> {
        let dir = self.entry_dir(id);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(BantuboxError::ContainerNotFound { id: id.to_string() })
        }
    }

    fn remove(&self, id: &ContainerId, dir: &Path) -> Result<()> {
        if let Some(Err(e)) = self.cgroups.as_ref().map(|cgroups| cgroups.remove(id)) {
            tracing::warn!(id = %id, error = %e, "failed to remove cgroup");
        }
        std::fs::remove_dir_all(dir).map_err(|e| BantuboxError::io(dir, e))?;
        tracing::debug!(id = %id, path = %dir.display(), "registry entry removed");
        Ok(())
    }
}

fn describe(id: String, dir: &Path) -> RegistryEntry {
    let pid = read_pid_file(&dir.join(PID_FILE)).unwrap_or_else(|e| {
        tracing::warn!(id = %id, error = %e, "unreadable pid record");
        None
    });
    let state = match pid {
        Some(pid) if process::is_alive(pid) => ContainerState::Running,
        Some(_) => ContainerState::Exited,
        None => ContainerState::Unknown,
    };
    let metadata = std::fs::read_to_string(dir.join(METADATA_FILE))
        .ok()
        .and_then(|json| serde_json::from_str(&json).ok());
    RegistryEntry {
        id,
        state,
        pid,
        metadata,
    }
}

fn read_pid_file(path: &Path) -> Result<Option<Pid>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BantuboxError::io(path, e)),
    };
    let raw: i32 = content.trim().parse().map_err(|_| BantuboxError::Config {
        message: format!("{} does not hold a pid", path.display()),
    })?;
    if raw <= 0 {
        return Err(BantuboxError::Config {
            message: format!("{} holds invalid pid {raw}", path.display()),
        });
    }
    Ok(Some(Pid::from_raw(raw)))
}

/// SIGTERM, wait `grace`, SIGKILL, wait again.
fn terminate(pid: Pid, grace: Duration) -> Result<()> {
    process::send_signal(pid, Signal::SIGTERM)?;
    if wait_for_exit(pid, grace) {
        return Ok(());
    }
    tracing::info!(%pid, grace_secs = grace.as_secs(), "process ignored SIGTERM, sending SIGKILL");
    process::send_signal(pid, Signal::SIGKILL)?;
    if wait_for_exit(pid, Duration::from_secs(KILL_TIMEOUT_SECS)) {
        return Ok(());
    }
    Err(BantuboxError::ProcessSignalFailure {
        pid: pid.as_raw(),
        source: std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "process still alive after SIGKILL",
        ),
    })
}

fn wait_for_exit(pid: Pid, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !process::is_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEAD_PID: i32 = 4_194_305;

    fn registry() -> (tempfile::TempDir, ContainerRegistry) {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ContainerRegistry::new(dir.path().join("containers"));
        (dir, registry)
    }

    #[test]
    fn list_without_container_dir_is_empty() {
        let (_dir, registry) = registry();
        assert!(registry.list().expect("list").is_empty());
    }

    #[test]
    fn list_reports_state_from_pid_record() {
        let (_dir, registry) = registry();
        let live = ContainerId::generate();
        let dead = ContainerId::generate();
        let fresh = ContainerId::generate();
        for id in [&live, &dead, &fresh] {
            let _ = registry.create(id).expect("create");
        }
        registry.write_pid(&live, Pid::this()).expect("pid");
        registry.write_pid(&dead, Pid::from_raw(DEAD_PID)).expect("pid");

        let entries = registry.list().expect("list");
        let state_of = |id: &ContainerId| {
            entries
                .iter()
                .find(|e| e.id == id.as_str())
                .map(|e| e.state)
                .expect("listed")
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(state_of(&live), ContainerState::Running);
        assert_eq!(state_of(&dead), ContainerState::Exited);
        assert_eq!(state_of(&fresh), ContainerState::Unknown);
    }

    #[test]
    fn list_ignores_plain_files() {
        let (_dir, registry) = registry();
        let _ = registry.create(&ContainerId::generate()).expect("create");
        std::fs::write(registry.root().join("stray"), "x").expect("write");
        assert_eq!(registry.list().expect("list").len(), 1);
    }

    #[test]
    fn read_pid_roundtrip_and_missing_record() {
        let (_dir, registry) = registry();
        let id = ContainerId::generate();
        let record = registry.create(&id).expect("create").join(PID_FILE);
        assert_eq!(read_pid_file(&record).expect("read"), None);
        registry.write_pid(&id, Pid::from_raw(4242)).expect("write");
        assert_eq!(read_pid_file(&record).expect("read"), Some(Pid::from_raw(4242)));
    }

    #[test]
    fn corrupt_pid_record_is_an_error() {
        let (_dir, registry) = registry();
        let id = ContainerId::generate();
        let dir = registry.create(&id).expect("create");
        std::fs::write(dir.join(PID_FILE), "not-a-pid").expect("write");
        assert!(matches!(
            registry.stop(&id, Duration::ZERO),
            Err(BantuboxError::Config { .. })
        ));
        assert!(dir.is_dir());
    }

    #[test]
    fn stop_unknown_id_leaves_registry_untouched() {
        let (_dir, registry) = registry();
        let existing = ContainerId::generate();
        let _ = registry.create(&existing).expect("create");

        let result = registry.stop(&ContainerId::generate(), Duration::ZERO);
        assert!(matches!(result, Err(BantuboxError::ContainerNotFound { .. })));
        assert_eq!(registry.list().expect("list").len(), 1);
    }

    #[test]
    fn stop_exited_container_removes_entry() {
        let (_dir, registry) = registry();
        let id = ContainerId::generate();
        let dir = registry.create(&id).expect("create");
        std::fs::create_dir_all(dir.join("cow_rw/etc")).expect("mkdir");
        registry.write_pid(&id, Pid::from_raw(DEAD_PID)).expect("pid");

        registry.stop(&id, Duration::ZERO).expect("stop");
        assert!(!dir.exists());
        assert!(registry.list().expect("list").is_empty());
    }

    #[test]
    fn delete_unknown_id_is_not_found() {
        let (_dir, registry) = registry();
        assert!(matches!(
            registry.delete(&ContainerId::generate(), false, Duration::ZERO),
            Err(BantuboxError::ContainerNotFound { .. })
        ));
    }

    #[test]
    fn delete_refuses_live_container_without_force() {
        let (_dir, registry) = registry();
        let id = ContainerId::generate();
        let dir = registry.create(&id).expect("create");
        registry.write_pid(&id, Pid::this()).expect("pid");

        assert!(matches!(
            registry.delete(&id, false, Duration::ZERO),
            Err(BantuboxError::ContainerRunning { .. })
        ));
        assert!(dir.exists());
    }

    #[test]
    fn delete_exited_container_is_permanent() {
        let (_dir, registry) = registry();
        let id = ContainerId::generate();
        let dir = registry.create(&id).expect("create");
        registry.write_pid(&id, Pid::from_raw(DEAD_PID)).expect("pid");

        registry.delete(&id, false, Duration::ZERO).expect("delete");
        assert!(!dir.exists());
        assert!(registry.list().expect("list").is_empty());
    }

    #[test]
    fn create_refuses_existing_entry() {
        let (_dir, registry) = registry();
        let id = ContainerId::generate();
        let _ = registry.create(&id).expect("create");
        assert!(matches!(registry.create(&id), Err(BantuboxError::Io { .. })));
    }

    #[test]
    fn terminate_reaps_a_real_child() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");
        let pid = Pid::from_raw(i32::try_from(child.id()).expect("pid fits"));

        // The child stays a zombie until waited on, so reap concurrently.
        let reaper = std::thread::spawn(move || child.wait().expect("wait"));
        terminate(pid, Duration::from_secs(5)).expect("terminate");
        let status = reaper.join().expect("join");
        assert!(!status.success());
    }
}
