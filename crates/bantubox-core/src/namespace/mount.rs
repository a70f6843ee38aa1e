//! Mount namespace isolation.
//!
//! The ordered protocol run inside a freshly cloned mount namespace: make
//! propagation private, build the overlay root, mount pseudo-filesystems,
//! populate `/dev`, and pivot into the new root. Every step assumes the
//! previous one succeeded; the first error aborts the sequence.

use std::path::Path;

use bantubox_common::error::Result;

use crate::filesystem::pivot_root::OldRoot;
use crate::filesystem::{devices, mount, overlayfs, pivot_root};

/// Isolates the calling process's filesystem view.
///
/// `entry_dir` is the container's registry entry and `template` the
/// extracted image root. On success the process's `/` is the merged
/// overlay and the host root is no longer reachable.
///
/// # Errors
///
/// Returns the first mount, device, or pivot failure. The caller must not
/// exec the user command after an error.
pub fn isolate_root(entry_dir: &Path, template: &Path) -> Result<OldRoot> {
    mount::make_root_private()?;
    let rootfs = overlayfs::build_container_root(entry_dir, template)?;
    mount::mount_essential_filesystems(&rootfs)?;
    devices::populate_dev(&rootfs.join("dev"))?;
    let old_root = pivot_root::pivot_root(&rootfs)?;
    tracing::info!(rootfs = %rootfs.display(), "mount namespace isolated");
    Ok(old_root)
}
