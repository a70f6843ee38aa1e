//! Container specification and its persisted metadata.

use std::path::{Path, PathBuf};

use bantubox_common::constants::PID_FILE;
use bantubox_common::error::{BantuboxError, Result};
use bantubox_common::types::{ContainerId, MemoryLimit, ResourceLimits};
use bantubox_image::storage::Image;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything needed to start one container. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    id: ContainerId,
    image: Image,
    command: Vec<String>,
    limits: ResourceLimits,
    entry_dir: PathBuf,
}

impl ContainerSpec {
    /// Builds a spec for a freshly generated id.
    ///
    /// `entry_dir` is the registry entry the container's root and PID
    /// record live under.
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::Config`] if `command` is empty.
    pub fn new(
        id: ContainerId,
        image: Image,
        command: Vec<String>,
        limits: ResourceLimits,
        entry_dir: PathBuf,
    ) -> Result<Self> {
        if command.is_empty() {
            return Err(BantuboxError::Config {
                message: "no command given".into(),
            });
        }
        Ok(Self {
            id,
            image,
            command,
            limits,
            entry_dir,
        })
    }

    /// Container id; also the container's hostname.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Resolved image whose template backs the root.
    #[must_use]
    pub const fn image(&self) -> &Image {
        &self.image
    }

    /// Command line executed inside the container.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Requested resource limits.
    #[must_use]
    pub const fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Registry entry directory.
    #[must_use]
    pub fn entry_dir(&self) -> &Path {
        &self.entry_dir
    }

    /// Path of the PID record.
    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        self.entry_dir.join(PID_FILE)
    }

    /// Snapshot of the spec for `config.json`, stamped now.
    #[must_use]
    pub fn metadata(&self) -> ContainerMetadata {
        ContainerMetadata {
            id: self.id.clone(),
            image: self.image.name.clone(),
            command: self.command.clone(),
            cpu_shares: self.limits.cpu_shares,
            memory: self.limits.memory,
            created_at: Utc::now(),
        }
    }
}

/// Descriptive record written next to the PID file. Informational only; the
/// entry directory stays the container's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// Container id.
    pub id: ContainerId,
    /// Image name.
    pub image: String,
    /// Command line.
    pub command: Vec<String>,
    /// Requested CPU shares, `0` if unset.
    pub cpu_shares: u64,
    /// Requested memory limit.
    pub memory: Option<MemoryLimit>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
