//! `OverlayFS` management for copy-on-write container roots.
//!
//! Each container stacks a private writable layer on top of the shared,
//! read-only image template. The merged view becomes the container's `/`.

use std::path::{Path, PathBuf};

use bantubox_common::constants::{COW_RW_DIR, COW_WORKDIR_DIR, ROOTFS_DIR};
use bantubox_common::error::{BantuboxError, MountKind, Result};

/// Configuration for an `OverlayFS` mount.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Read-only lower layers (bottom to top).
    pub lower_dirs: Vec<PathBuf>,
    /// Writable upper layer directory.
    pub upper_dir: PathBuf,
    /// Work directory required by `OverlayFS`.
    pub work_dir: PathBuf,
    /// Final merged mount point.
    pub merged_dir: PathBuf,
}

impl OverlayConfig {
    /// Renders the `lowerdir=..,upperdir=..,workdir=..` mount data.
    ///
    /// `OverlayFS` lists the topmost lower layer first, so the bottom-to-top
    /// order of [`Self::lower_dirs`] is reversed.
    #[must_use]
    pub fn mount_data(&self) -> String {
        let lowers = self
            .lower_dirs
            .iter()
            .rev()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        format!(
            "lowerdir={},upperdir={},workdir={}",
            lowers,
            self.upper_dir.display(),
            self.work_dir.display()
        )
    }
}

/// The per-container directory triple under `<container_dir>/<id>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRoot {
    /// Writable layer (`cow_rw`).
    pub upper_dir: PathBuf,
    /// Overlay metadata (`cow_workdir`).
    pub work_dir: PathBuf,
    /// Merged mountpoint (`rootfs`), valid only while mounted.
    pub merged_dir: PathBuf,
}

impl ContainerRoot {
    /// Derives the triple for a registry entry directory.
    #[must_use]
    pub fn new(entry_dir: &Path) -> Self {
        Self {
            upper_dir: entry_dir.join(COW_RW_DIR),
            work_dir: entry_dir.join(COW_WORKDIR_DIR),
            merged_dir: entry_dir.join(ROOTFS_DIR),
        }
    }

    /// Creates the three directories, ignoring any that already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [&self.upper_dir, &self.work_dir, &self.merged_dir] {
            std::fs::create_dir_all(dir).map_err(|e| BantuboxError::io(dir, e))?;
        }
        Ok(())
    }

    /// Overlay configuration stacking this root on `template`.
    #[must_use]
    pub fn overlay(&self, template: &Path) -> OverlayConfig {
        OverlayConfig {
            lower_dirs: vec![template.to_path_buf()],
            upper_dir: self.upper_dir.clone(),
            work_dir: self.work_dir.clone(),
            merged_dir: self.merged_dir.clone(),
        }
    }
}

/// Mounts an `OverlayFS` with the given configuration.
///
/// The mount carries `MS_NODEV`, so device files smuggled into any layer
/// are inert.
///
/// # Errors
///
/// Returns [`BantuboxError::MountFailure`] if the mount syscall fails.
pub fn mount_overlay(config: &OverlayConfig) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    let opts = config.mount_data();
    mount(
        Some("overlay"),
        &config.merged_dir,
        Some("overlay"),
        MsFlags::MS_NODEV,
        Some(opts.as_str()),
    )
    .map_err(|e| BantuboxError::MountFailure {
        kind: MountKind::Overlay,
        target: config.merged_dir.clone(),
        source: e.into(),
    })?;

    tracing::info!(merged = %config.merged_dir.display(), "overlayfs mounted");
    Ok(())
}

/// Builds the merged root for a container: creates the copy-on-write
/// directories under `entry_dir` and mounts the overlay over `template`.
///
/// Safe to call again for the same entry; existing upper-layer content is
/// kept.
///
/// # Errors
///
/// Returns an error if directory creation or the overlay mount fails.
pub fn build_container_root(entry_dir: &Path, template: &Path) -> Result<PathBuf> {
    let root = ContainerRoot::new(entry_dir);
    root.create_dirs()?;
    mount_overlay(&root.overlay(template))?;
    Ok(root.merged_dir)
}
