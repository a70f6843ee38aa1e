//! Filesystem layer extraction.
//!
//! An image is a single tarball unpacked into a template root. Character
//! and block device entries are never created: an untrusted archive must
//! not be able to plant host device nodes.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use tar::EntryType;

/// Result of unpacking one archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layer {
    /// Size of the archive in bytes.
    pub size_bytes: u64,
    /// Entries written to the target.
    pub entries: u64,
    /// Device entries that were filtered out.
    pub skipped_devices: u64,
}

/// Extracts a tar archive to the target directory, skipping character and
/// block devices.
///
/// Supports both plain and gzip-compressed archives, detected by content.
/// Entries whose path would escape `target` are not written. Ownership is
/// only restored when running as root, and a blank owner field reads as 0.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or an entry cannot be
/// written.
pub fn extract_layer(archive_path: &Path, target: &Path) -> io::Result<Layer> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting layer"
    );

    std::fs::create_dir_all(target)?;
    let file = File::open(archive_path)?;
    let size_bytes = file.metadata()?.len();

    let mut reader = BufReader::new(file);
    let reader: Box<dyn Read> = if is_gzip(reader.fill_buf()?) {
        Box::new(flate2::read::GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    let restore_owners = nix::unistd::geteuid().is_root();

    let mut layer = Layer {
        size_bytes,
        ..Layer::default()
    };
    for entry in archive.entries()? {
        let mut entry = entry?;
        if is_device(entry.header().entry_type()) {
            tracing::debug!(path = %entry.path()?.display(), "skipping device entry");
            layer.skipped_devices += 1;
            continue;
        }
        if entry.unpack_in(target)? {
            layer.entries += 1;
            if restore_owners {
                restore_ownership(&entry, target)?;
            }
        }
    }

    tracing::info!(
        entries = layer.entries,
        skipped_devices = layer.skipped_devices,
        size = size_bytes,
        "layer extracted"
    );
    Ok(layer)
}

/// Applies the entry's numeric owner to what was unpacked. `chown` clears
/// set-id bits, so the mode is written again afterwards.
fn restore_ownership<R: Read>(entry: &tar::Entry<'_, R>, target: &Path) -> io::Result<()> {
    let header = entry.header();
    let relative: PathBuf = entry
        .path()?
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    let path = target.join(relative);

    std::os::unix::fs::lchown(&path, Some(owner_id(header.uid())), Some(owner_id(header.gid())))?;
    if header.entry_type() != EntryType::Symlink {
        if let Ok(mode) = header.mode() {
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode & 0o7777))?;
        }
    }
    Ok(())
}

fn owner_id(field: io::Result<u64>) -> u32 {
    field.ok().and_then(|id| u32::try_from(id).ok()).unwrap_or(0)
}

const fn is_device(kind: EntryType) -> bool {
    matches!(kind, EntryType::Char | EntryType::Block)
}

/// Checks for the gzip magic bytes.
fn is_gzip(head: &[u8]) -> bool {
    head.starts_with(&[0x1f, 0x8b])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append_file(builder: &mut tar::Builder<impl io::Write>, path: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder
            .append_data(&mut header, path, data)
            .expect("failed to append data");
    }

    fn append_device(builder: &mut tar::Builder<impl io::Write>, path: &str, kind: EntryType) {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(kind);
        header.set_size(0);
        header.set_mode(0o666);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(1_700_000_000);
        header.set_device_major(1).expect("major");
        header.set_device_minor(3).expect("minor");
        header.set_cksum();
        builder
            .append_data(&mut header, path, io::empty())
            .expect("failed to append device");
    }

    fn create_test_tar(dir: &Path) -> std::path::PathBuf {
        let tar_path = dir.join("test.tar");
        let file = File::create(&tar_path).expect("failed to create tar file");
        let mut builder = tar::Builder::new(file);
        append_file(&mut builder, "etc/hostname", b"template");
        append_device(&mut builder, "dev/null", EntryType::Char);
        append_device(&mut builder, "dev/sda", EntryType::Block);
        builder.finish().expect("failed to finish tar");
        tar_path
    }

    #[test]
    fn extract_skips_device_entries() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let tar_path = create_test_tar(dir.path());
        let target = dir.path().join("extracted");

        let layer = extract_layer(&tar_path, &target).expect("extract failed");
        assert_eq!(layer.entries, 1);
        assert_eq!(layer.skipped_devices, 2);
        assert!(target.join("etc/hostname").exists());
        assert!(target.join("dev/null").symlink_metadata().is_err());
        assert!(target.join("dev/sda").symlink_metadata().is_err());
    }

    #[test]
    fn extract_gzip_tar_by_content() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let tar_path = dir.path().join("image.tar");
        let file = File::create(&tar_path).expect("failed to create tar");
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        append_file(&mut builder, "gzhello.txt", b"hello from gzipped layer");
        let encoder = builder.into_inner().expect("failed to finish encoder");
        let _ = encoder.finish().expect("failed to finish gzip");

        let target = dir.path().join("extracted_gz");
        extract_layer(&tar_path, &target).expect("extract failed");
        let content = std::fs::read_to_string(target.join("gzhello.txt")).expect("read failed");
        assert_eq!(content, "hello from gzipped layer");
    }

    #[test]
    fn extract_nonexistent_archive_returns_error() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let result = extract_layer(&dir.path().join("missing.tar"), &dir.path().join("out"));
        assert!(result.is_err());
    }

    #[test]
    fn extract_tolerates_blank_owner_fields() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let tar_path = dir.path().join("blank.tar");
        let mut builder = tar::Builder::new(File::create(&tar_path).expect("create tar"));
        let data = b"no owner recorded";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "blank.txt", &data[..])
            .expect("failed to append data");
        builder.finish().expect("failed to finish tar");

        let target = dir.path().join("extracted");
        let layer = extract_layer(&tar_path, &target).expect("extract failed");
        assert_eq!(layer.entries, 1);
        let content = std::fs::read_to_string(target.join("blank.txt")).expect("read failed");
        assert_eq!(content, "no owner recorded");
    }

    #[test]
    fn extract_restores_owner_and_setuid_as_root() {
        use std::os::unix::fs::MetadataExt;

        if !nix::unistd::geteuid().is_root() {
            return;
        }
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let tar_path = dir.path().join("owned.tar");
        let mut builder = tar::Builder::new(File::create(&tar_path).expect("create tar"));
        let mut header = tar::Header::new_gnu();
        header.set_size(2);
        header.set_mode(0o4755);
        header.set_uid(1000);
        header.set_gid(1000);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder
            .append_data(&mut header, "bin/su", &b"su"[..])
            .expect("failed to append data");
        builder.finish().expect("failed to finish tar");

        let target = dir.path().join("extracted");
        let _ = extract_layer(&tar_path, &target).expect("extract failed");
        let metadata = std::fs::metadata(target.join("bin/su")).expect("metadata");
        assert_eq!((metadata.uid(), metadata.gid()), (1000, 1000));
        assert_eq!(metadata.mode() & 0o7777, 0o4755);
    }

    #[test]
    fn owner_id_of_unreadable_field_is_root() {
        assert_eq!(owner_id(Ok(1000)), 1000);
        assert_eq!(owner_id(Err(io::Error::other("blank"))), 0);
        assert_eq!(owner_id(Ok(u64::MAX)), 0);
    }

    #[test]
    fn gzip_magic_detection() {
        assert!(is_gzip(&[0x1f, 0x8b, 0x08]));
        assert!(!is_gzip(b"ustar"));
        assert!(!is_gzip(&[]));
    }
}
