//! Secure root filesystem switching via `pivot_root(2)`.
//!
//! More secure than `chroot` because it actually changes the root mount
//! point rather than just the process's view of `/`, and the old root can
//! be detached entirely.

use std::path::{Path, PathBuf};

use bantubox_common::constants::OLD_ROOT_DIR;
use bantubox_common::error::{BantuboxError, Result};
use nix::mount::{MntFlags, umount2};
use nix::unistd::chdir;

/// What remained of the old root after it was detached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OldRoot {
    /// The mountpoint was empty and has been removed.
    Removed,
    /// Something still references the old root; the directory was kept.
    Retained(PathBuf),
}

/// Switches the root filesystem to `new_root`.
///
/// The old root is moved onto `<new_root>/old_root`, lazily unmounted, and
/// its mountpoint removed if it is empty afterwards. A non-empty mountpoint
/// is reported as [`OldRoot::Retained`] with a warning, not as an error.
///
/// # Errors
///
/// Returns [`BantuboxError::PivotRootFailure`] if creating the mountpoint,
/// `pivot_root(2)`, `chdir(2)`, or the detach fails.
pub fn pivot_root(new_root: &Path) -> Result<OldRoot> {
    tracing::info!(new_root = %new_root.display(), "performing pivot_root");
    let fail = |source: std::io::Error| BantuboxError::PivotRootFailure {
        new_root: new_root.to_path_buf(),
        source,
    };

    let put_old = new_root.join(OLD_ROOT_DIR);
    std::fs::create_dir_all(&put_old).map_err(fail)?;

    chdir(new_root).map_err(|e| fail(e.into()))?;
    nix::unistd::pivot_root(new_root, &put_old).map_err(|e| fail(e.into()))?;
    chdir("/").map_err(|e| fail(e.into()))?;

    let old_root = Path::new("/").join(OLD_ROOT_DIR);
    umount2(&old_root, MntFlags::MNT_DETACH).map_err(|e| fail(e.into()))?;

    remove_if_empty(&old_root)
}

/// Removes `dir` when it has no entries; otherwise keeps it and warns.
///
/// # Errors
///
/// Returns [`BantuboxError::PivotRootFailure`] if the directory cannot be
/// listed or removed.
pub fn remove_if_empty(dir: &Path) -> Result<OldRoot> {
    let fail = |source: std::io::Error| BantuboxError::PivotRootFailure {
        new_root: PathBuf::from("/"),
        source,
    };
    let mut entries = std::fs::read_dir(dir).map_err(fail)?;
    if entries.next().is_some() {
        tracing::warn!(path = %dir.display(), "old root is not empty after detach, keeping it");
        return Ok(OldRoot::Retained(dir.to_path_buf()));
    }
    std::fs::remove_dir(dir).map_err(fail)?;
    Ok(OldRoot::Removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_old_root_is_removed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let old = dir.path().join("old_root");
        std::fs::create_dir(&old).expect("mkdir");

        assert_eq!(remove_if_empty(&old).expect("remove"), OldRoot::Removed);
        assert!(!old.exists());
    }

    #[test]
    fn populated_old_root_is_retained() {
        let dir = tempfile::tempdir().expect("tempdir");
        let old = dir.path().join("old_root");
        std::fs::create_dir_all(old.join("busy")).expect("mkdir");

        assert_eq!(
            remove_if_empty(&old).expect("inspect"),
            OldRoot::Retained(old.clone())
        );
        assert!(old.join("busy").exists());
    }
}
