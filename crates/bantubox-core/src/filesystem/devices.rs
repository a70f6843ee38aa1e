//! Population of the container's `/dev`.
//!
//! Creates the standard-stream symlinks and the minimal set of character
//! devices every Linux userland expects. Existing entries are left alone.

use std::io;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::Path;

use bantubox_common::error::{BantuboxError, Result};
use nix::sys::stat::{Mode, SFlag, makedev, mknod};

/// A character device node to create under `/dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharDevice {
    /// File name under `/dev`.
    pub name: &'static str,
    /// Major device number.
    pub major: u64,
    /// Minor device number.
    pub minor: u64,
}

/// Character devices created in every container.
pub const DEVICES: [CharDevice; 7] = [
    CharDevice { name: "null", major: 1, minor: 3 },
    CharDevice { name: "zero", major: 1, minor: 5 },
    CharDevice { name: "random", major: 1, minor: 8 },
    CharDevice { name: "urandom", major: 1, minor: 9 },
    CharDevice { name: "console", major: 136, minor: 1 },
    CharDevice { name: "tty", major: 5, minor: 0 },
    CharDevice { name: "full", major: 1, minor: 7 },
];

/// Symlinks created in every container, as `(name, target)`.
///
/// One link per standard stream, plus the conventional `fd` and `ptmx`
/// links.
pub const SYMLINKS: [(&str, &str); 5] = [
    ("stdin", "/proc/self/fd/0"),
    ("stdout", "/proc/self/fd/1"),
    ("stderr", "/proc/self/fd/2"),
    ("fd", "/proc/self/fd"),
    ("ptmx", "pts/ptmx"),
];

const DEVICE_MODE: u32 = 0o666;

/// Populates `dev_dir` with [`SYMLINKS`] and [`DEVICES`].
///
/// # Errors
///
/// Returns [`BantuboxError::DeviceCreationFailure`] naming the first entry
/// that could not be created.
pub fn populate_dev(dev_dir: &Path) -> Result<()> {
    create_symlinks(dev_dir)?;
    create_device_nodes(dev_dir)?;
    tracing::debug!(dev = %dev_dir.display(), "device nodes populated");
    Ok(())
}

/// Creates the entries of [`SYMLINKS`] that do not exist yet.
///
/// # Errors
///
/// Returns [`BantuboxError::DeviceCreationFailure`] if a link cannot be created.
pub fn create_symlinks(dev_dir: &Path) -> Result<()> {
    for (name, target) in SYMLINKS {
        let link = dev_dir.join(name);
        if link.symlink_metadata().is_ok() {
            continue;
        }
        symlink(target, &link).map_err(|e| BantuboxError::DeviceCreationFailure {
            device: name.to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Creates the nodes of [`DEVICES`] that do not exist yet, with mode
/// `0666` regardless of the process umask.
///
/// # Errors
///
/// Returns [`BantuboxError::DeviceCreationFailure`] if `mknod(2)` or the
/// follow-up `chmod(2)` fails for any reason other than the node existing.
pub fn create_device_nodes(dev_dir: &Path) -> Result<()> {
    for dev in DEVICES {
        let path = dev_dir.join(dev.name);
        if path.symlink_metadata().is_ok() {
            continue;
        }
        let fail = |source: io::Error| BantuboxError::DeviceCreationFailure {
            device: dev.name.to_string(),
            source,
        };
        match mknod(
            &path,
            SFlag::S_IFCHR,
            Mode::from_bits_truncate(DEVICE_MODE),
            makedev(dev.major, dev.minor),
        ) {
            Ok(()) => {}
            Err(nix::errno::Errno::EEXIST) => continue,
            Err(e) => return Err(fail(e.into())),
        }
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(DEVICE_MODE))
            .map_err(fail)?;
    }
    Ok(())
}
