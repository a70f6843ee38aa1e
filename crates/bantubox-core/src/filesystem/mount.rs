//! Mount utilities for container filesystem setup.
//!
//! Handles mount propagation and the pseudo-filesystems (`/proc`, `/sys`,
//! `/dev`, `/dev/pts`) inside the container's namespace.

use std::path::Path;

use bantubox_common::error::{BantuboxError, MountKind, Result};
use nix::mount::{MsFlags, mount};

/// Marks every mount in the current namespace private, recursively, so
/// nothing mounted afterwards propagates back to the host.
///
/// # Errors
///
/// Returns [`BantuboxError::MountFailure`] with [`MountKind::Propagation`].
pub fn make_root_private() -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| BantuboxError::MountFailure {
        kind: MountKind::Propagation,
        target: "/".into(),
        source: e.into(),
    })?;
    tracing::debug!("root mount made private");
    Ok(())
}

/// Creates the `proc`, `sys`, and `dev` mountpoints under `rootfs`.
///
/// `dev/pts` is created later, after `tmpfs` has been mounted on `dev`.
///
/// # Errors
///
/// Returns an error if a directory cannot be created.
pub fn ensure_mountpoints(rootfs: &Path) -> Result<()> {
    for name in ["proc", "sys", "dev"] {
        let dir = rootfs.join(name);
        std::fs::create_dir_all(&dir).map_err(|e| BantuboxError::io(&dir, e))?;
    }
    Ok(())
}

/// Mounts essential pseudo-filesystems inside the container root.
///
/// `proc` on `proc`, `sysfs` on `sys`, a `tmpfs` (nosuid, strictatime,
/// mode 0755) on `dev`, then `devpts` on `dev/pts`.
///
/// # Errors
///
/// Returns the [`BantuboxError::MountFailure`] of the first mount that fails.
pub fn mount_essential_filesystems(rootfs: &Path) -> Result<()> {
    tracing::debug!(rootfs = %rootfs.display(), "mounting essential filesystems");
    ensure_mountpoints(rootfs)?;

    mount_pseudo(rootfs, "proc", "proc", MountKind::Proc, MsFlags::empty(), None)?;
    mount_pseudo(rootfs, "sys", "sysfs", MountKind::Sysfs, MsFlags::empty(), None)?;
    mount_pseudo(
        rootfs,
        "dev",
        "tmpfs",
        MountKind::Tmpfs,
        MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME,
        Some("mode=755"),
    )?;

    let devpts = rootfs.join("dev/pts");
    std::fs::create_dir_all(&devpts).map_err(|e| BantuboxError::io(&devpts, e))?;
    mount_pseudo(
        rootfs,
        "dev/pts",
        "devpts",
        MountKind::Devpts,
        MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC,
        Some("newinstance,ptmxmode=0666,mode=0620"),
    )?;
    Ok(())
}

fn mount_pseudo(
    rootfs: &Path,
    relative: &str,
    fstype: &str,
    kind: MountKind,
    flags: MsFlags,
    data: Option<&str>,
) -> Result<()> {
    let target = rootfs.join(relative);
    mount(Some(fstype), &target, Some(fstype), flags, data).map_err(|e| {
        BantuboxError::MountFailure {
            kind,
            target: target.clone(),
            source: e.into(),
        }
    })?;
    tracing::debug!(target = %target.display(), fstype, "mounted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_mountpoints_creates_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        ensure_mountpoints(dir.path()).expect("first");
        ensure_mountpoints(dir.path()).expect("second");
        for name in ["proc", "sys", "dev"] {
            assert!(dir.path().join(name).is_dir(), "{name} missing");
        }
        assert!(!dir.path().join("dev/pts").exists());
    }
}
