//! System-wide constants and default paths.
//!
//! Defaults are only consulted when building a [`crate::config::BantuboxConfig`];
//! everything below the CLI receives resolved paths explicitly.

/// Default directory holding image tarballs and their cached templates.
pub const DEFAULT_IMAGE_DIR: &str = "/var/lib/bantubox/images";

/// Default directory holding one registry entry per container.
pub const DEFAULT_CONTAINER_DIR: &str = "/var/lib/bantubox/containers";

/// Mount point of the host cgroup filesystem.
pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Image used by `run` when none is given.
pub const DEFAULT_IMAGE_NAME: &str = "ubuntu";

/// Runtime-owned parent scope for per-container cgroups.
pub const CGROUP_SCOPE: &str = "bantubox";

/// File extension of image tarballs.
pub const IMAGE_SUFFIX: &str = "tar";

/// Name of the extracted template directory under `<image_dir>/<name>/`.
pub const TEMPLATE_DIR: &str = "rootfs";

/// Writable overlay layer under a registry entry.
pub const COW_RW_DIR: &str = "cow_rw";

/// Overlay metadata directory under a registry entry.
pub const COW_WORKDIR_DIR: &str = "cow_workdir";

/// Merged overlay mountpoint under a registry entry.
pub const ROOTFS_DIR: &str = "rootfs";

/// PID record of the supervised process.
pub const PID_FILE: &str = "pid.txt";

/// Descriptive metadata written at `run`.
pub const METADATA_FILE: &str = "config.json";

/// Directory the old root is pivoted onto, relative to the new root.
pub const OLD_ROOT_DIR: &str = "old_root";

/// Seconds `stop` waits after SIGTERM before escalating to SIGKILL.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Seconds `stop` waits for a process to vanish after SIGKILL.
pub const KILL_TIMEOUT_SECS: u64 = 5;

/// Exit code of a container child whose isolation setup failed before exec.
pub const SETUP_FAILURE_EXIT_CODE: i32 = 125;

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_ENV: &str = "BANTUBOX_CONFIG";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "bb";
