//! Unified error types for the BantuBox workspace.
//!
//! Every library crate returns [`Result`]; the CLI wraps these in `anyhow`
//! at the top level only.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which mount in the isolation sequence failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountKind {
    /// Remounting `/` as private and recursive.
    Propagation,
    /// The copy-on-write overlay forming the container root.
    Overlay,
    /// `proc` on `<root>/proc`.
    Proc,
    /// `sysfs` on `<root>/sys`.
    Sysfs,
    /// `tmpfs` on `<root>/dev`.
    Tmpfs,
    /// `devpts` on `<root>/dev/pts`.
    Devpts,
}

impl fmt::Display for MountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Propagation => "propagation",
            Self::Overlay => "overlay",
            Self::Proc => "proc",
            Self::Sysfs => "sysfs",
            Self::Tmpfs => "tmpfs",
            Self::Devpts => "devpts",
        };
        f.write_str(name)
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BantuboxError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The configured image directory does not exist.
    #[error("image directory {path} does not exist")]
    ImageDirectoryNotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// No tarball exists for the requested image.
    #[error("unable to locate image {name} (expected {path})")]
    ImageNotFound {
        /// Requested image name.
        name: String,
        /// Tarball path that was looked up.
        path: PathBuf,
    },

    /// The image name cannot be mapped safely onto the image directory.
    #[error("invalid image name {name:?}")]
    InvalidImageName {
        /// The rejected name.
        name: String,
    },

    /// Unpacking an image tarball into its template failed.
    #[error("failed to extract image {image}: {source}")]
    ExtractionFailure {
        /// Image being extracted.
        image: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A mount in the isolation sequence failed.
    #[error("{kind} mount on {target} failed: {source}")]
    MountFailure {
        /// Which mount failed.
        kind: MountKind,
        /// Mount target.
        target: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Creating a device node or standard-stream link failed.
    #[error("failed to create device {device}: {source}")]
    DeviceCreationFailure {
        /// Device name under `/dev`.
        device: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Switching to the container root or detaching the old root failed.
    #[error("pivot_root into {new_root} failed: {source}")]
    PivotRootFailure {
        /// Intended new root.
        new_root: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Setting the container hostname failed.
    #[error("failed to set hostname {hostname}: {source}")]
    HostnameFailure {
        /// Requested hostname.
        hostname: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// A cgroup could not be created, joined, or limited.
    #[error("cgroup setup failed at {path}: {message}")]
    CgroupSetupFailure {
        /// Cgroup path involved.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Creating the isolated child process failed.
    #[error("failed to spawn container process: {source}")]
    ProcessSpawnFailure {
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The container child reported a failure before reaching exec.
    #[error("container {id} setup failed: {message}")]
    ContainerSetupFailure {
        /// Container whose setup failed.
        id: String,
        /// Error reported by the child.
        message: String,
    },

    /// No registry entry exists for the id.
    #[error("container {id} not found")]
    ContainerNotFound {
        /// Requested container id.
        id: String,
    },

    /// The operation requires a stopped container.
    #[error("container {id} is still running (pid {pid})")]
    ContainerRunning {
        /// Container id.
        id: String,
        /// Recorded PID that is still alive.
        pid: i32,
    },

    /// Delivering a signal to a container process failed.
    #[error("failed to signal pid {pid}: {source}")]
    ProcessSignalFailure {
        /// Target PID.
        pid: i32,
        /// Underlying OS error.
        source: std::io::Error,
    },
}

impl BantuboxError {
    /// Builds a [`BantuboxError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BantuboxError>;
