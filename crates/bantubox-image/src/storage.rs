//! Local image store.
//!
//! Manages the on-disk layout of images under the configured image
//! directory:
//!
//! ```text
//! <image_dir>/<name>.tar           input image
//! <image_dir>/<name>/rootfs/...    cached template, extracted once
//! ```

use std::path::{Path, PathBuf};

use bantubox_common::constants::{IMAGE_SUFFIX, TEMPLATE_DIR};
use bantubox_common::error::{BantuboxError, Result};

use crate::layer;

/// A resolved image: its tarball exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Image name.
    pub name: String,
    /// Source tarball.
    pub tarball: PathBuf,
    /// Cached template root; present once materialized.
    pub template: PathBuf,
}

/// An image found by [`ImageStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    /// Image name.
    pub name: String,
    /// Tarball size in bytes.
    pub size_bytes: u64,
    /// Whether the template has been extracted.
    pub cached: bool,
}

/// Resolves image names to tarballs and caches their extracted templates.
#[derive(Debug, Clone)]
pub struct ImageStore {
    image_dir: PathBuf,
}

impl ImageStore {
    /// Creates a store rooted at `image_dir`. Nothing is touched on disk.
    #[must_use]
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
        }
    }

    /// Returns the image directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.image_dir
    }

    /// Returns `<image_dir>/<name>.tar`.
    #[must_use]
    pub fn tarball_path(&self, name: &str) -> PathBuf {
        self.image_dir.join(format!("{name}.{IMAGE_SUFFIX}"))
    }

    /// Returns `<image_dir>/<name>/rootfs`.
    #[must_use]
    pub fn template_path(&self, name: &str) -> PathBuf {
        self.image_dir.join(name).join(TEMPLATE_DIR)
    }

    /// Resolves `name` to its tarball.
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::ImageDirectoryNotFound`] if the image
    /// directory is absent, [`BantuboxError::InvalidImageName`] if `name`
    /// is not a plain file name, or [`BantuboxError::ImageNotFound`] if the
    /// tarball is absent.
    pub fn resolve(&self, name: &str) -> Result<Image> {
        if !self.image_dir.is_dir() {
            return Err(BantuboxError::ImageDirectoryNotFound {
                path: self.image_dir.clone(),
            });
        }
        validate_name(name)?;
        let tarball = self.tarball_path(name);
        if !tarball.is_file() {
            return Err(BantuboxError::ImageNotFound {
                name: name.to_string(),
                path: tarball,
            });
        }
        Ok(Image {
            name: name.to_string(),
            tarball,
            template: self.template_path(name),
        })
    }

    /// Ensures the template of `image` exists, extracting it if needed.
    ///
    /// The archive is unpacked next to the template and renamed into place
    /// only on success, so a template directory is never half-populated.
    /// An existing template is returned untouched.
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::ExtractionFailure`] if unpacking or the
    /// final rename fails.
    pub fn materialize(&self, image: &Image) -> Result<PathBuf> {
        if image.template.is_dir() {
            tracing::debug!(image = %image.name, "template already cached");
            return Ok(image.template.clone());
        }

        let fail = |source: std::io::Error| BantuboxError::ExtractionFailure {
            image: image.name.clone(),
            source,
        };
        let image_root = self.image_dir.join(&image.name);
        std::fs::create_dir_all(&image_root).map_err(fail)?;
        let partial = image_root.join(format!("{TEMPLATE_DIR}.partial-{}", uuid::Uuid::new_v4()));

        if let Err(e) = layer::extract_layer(&image.tarball, &partial) {
            discard(&partial);
            return Err(fail(e));
        }

        promote(image, &partial)
    }

    /// Resolves `name` and materializes its template.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve`] and [`Self::materialize`].
    pub fn prepare(&self, name: &str) -> Result<Image> {
        let image = self.resolve(name)?;
        let _ = self.materialize(&image)?;
        Ok(image)
    }

    /// Lists every `*.tar` in the image directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::ImageDirectoryNotFound`] if the directory is
    /// absent, or an I/O error if it cannot be read.
    pub fn list(&self) -> Result<Vec<ImageSummary>> {
        if !self.image_dir.is_dir() {
            return Err(BantuboxError::ImageDirectoryNotFound {
                path: self.image_dir.clone(),
            });
        }
        let entries =
            std::fs::read_dir(&self.image_dir).map_err(|e| BantuboxError::io(&self.image_dir, e))?;

        let mut images = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BantuboxError::io(&self.image_dir, e))?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != IMAGE_SUFFIX) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let metadata = entry.metadata().map_err(|e| BantuboxError::io(&path, e))?;
            if !metadata.is_file() {
                continue;
            }
            images.push(ImageSummary {
                name: name.to_string(),
                size_bytes: metadata.len(),
                cached: self.template_path(name).is_dir(),
            });
        }
        images.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(images)
    }
}

/// Rejects names that are not a single, ordinary path component.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(BantuboxError::InvalidImageName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Renames a fully extracted `partial` onto the template. Losing the race
/// to another extraction is success: the winner's template is kept.
fn promote(image: &Image, partial: &Path) -> Result<PathBuf> {
    if let Err(e) = std::fs::rename(partial, &image.template) {
        discard(partial);
        if image.template.is_dir() {
            tracing::debug!(image = %image.name, "template materialized concurrently");
            return Ok(image.template.clone());
        }
        return Err(BantuboxError::ExtractionFailure {
            image: image.name.clone(),
            source: e,
        });
    }

    tracing::info!(image = %image.name, template = %image.template.display(), "template materialized");
    Ok(image.template.clone())
}

fn discard(partial: &Path) {
    if let Err(e) = std::fs::remove_dir_all(partial) {
        tracing::warn!(path = %partial.display(), error = %e, "failed to remove partial template");
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    fn write_image(dir: &Path, name: &str) -> PathBuf {
        let tar_path = dir.join(format!("{name}.tar"));
        let file = File::create(&tar_path).expect("create tar");
        let mut builder = tar::Builder::new(file);
        let data = b"sentinel";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder
            .append_data(&mut header, "sentinel.txt", &data[..])
            .expect("append");
        builder.finish().expect("finish");
        tar_path
    }

    #[test]
    fn resolve_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ImageStore::new(dir.path().join("absent"));
        assert!(matches!(
            store.resolve("alpine"),
            Err(BantuboxError::ImageDirectoryNotFound { .. })
        ));
    }

    #[test]
    fn resolve_missing_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ImageStore::new(dir.path());
        assert!(matches!(
            store.resolve("doesnotexist"),
            Err(BantuboxError::ImageNotFound { .. })
        ));
    }

    #[test]
    fn resolve_rejects_path_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ImageStore::new(dir.path());
        for name in ["", ".", "..", "../etc", "a/b"] {
            assert!(
                matches!(store.resolve(name), Err(BantuboxError::InvalidImageName { .. })),
                "{name:?} accepted"
            );
        }
    }

    #[test]
    fn resolve_returns_layout_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _ = write_image(dir.path(), "alpine");
        let image = ImageStore::new(dir.path()).resolve("alpine").expect("resolve");
        assert_eq!(image.tarball, dir.path().join("alpine.tar"));
        assert_eq!(image.template, dir.path().join("alpine/rootfs"));
    }

    #[test]
    fn materialize_extracts_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _ = write_image(dir.path(), "alpine");
        let store = ImageStore::new(dir.path());

        let image = store.prepare("alpine").expect("first prepare");
        let sentinel = image.template.join("sentinel.txt");
        let first = std::fs::metadata(&sentinel).expect("sentinel").modified().expect("mtime");

        // A second extraction would recreate the file; removing the tarball
        // proves the cache is used.
        std::fs::remove_file(&image.tarball).expect("remove tarball");
        let template = store.materialize(&image).expect("second materialize");
        let second = std::fs::metadata(template.join("sentinel.txt"))
            .expect("sentinel")
            .modified()
            .expect("mtime");
        assert_eq!(first, second);
    }

    #[test]
    fn failed_extraction_leaves_no_template() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("broken.tar"), vec![0xffu8; 1024]).expect("write");
        let store = ImageStore::new(dir.path());
        let image = store.resolve("broken").expect("resolve");

        assert!(matches!(
            store.materialize(&image),
            Err(BantuboxError::ExtractionFailure { .. })
        ));
        assert!(!image.template.exists());
        let leftovers = std::fs::read_dir(dir.path().join("broken")).expect("read").count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn losing_the_rename_keeps_the_existing_template() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _ = write_image(dir.path(), "alpine");
        let image = ImageStore::new(dir.path()).resolve("alpine").expect("resolve");

        std::fs::create_dir_all(&image.template).expect("mkdir template");
        std::fs::write(image.template.join("winner.txt"), "first").expect("write");
        let partial = dir.path().join("alpine/rootfs.partial-late");
        std::fs::create_dir_all(&partial).expect("mkdir partial");
        std::fs::write(partial.join("loser.txt"), "second").expect("write");

        let template = promote(&image, &partial).expect("promote");
        assert_eq!(template, image.template);
        assert!(template.join("winner.txt").is_file());
        assert!(!template.join("loser.txt").exists());
        assert!(!partial.exists());
    }

    #[test]
    fn concurrent_prepares_share_one_template() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _ = write_image(dir.path(), "alpine");
        let store = ImageStore::new(dir.path());

        let templates: Vec<PathBuf> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| store.prepare("alpine").expect("prepare").template))
                .collect();
            workers.into_iter().map(|w| w.join().expect("join")).collect()
        });
        assert!(templates.iter().all(|t| *t == dir.path().join("alpine/rootfs")));
        assert!(templates[0].join("sentinel.txt").is_file());
        let entries = std::fs::read_dir(dir.path().join("alpine")).expect("read").count();
        assert_eq!(entries, 1, "partial directories left behind");
    }

    #[test]
    fn list_reports_tarballs_and_cache_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _ = write_image(dir.path(), "alpine");
        let _ = write_image(dir.path(), "busybox");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");
        let store = ImageStore::new(dir.path());
        let _ = store.prepare("busybox").expect("prepare");

        let images = store.list().expect("list");
        let names: Vec<_> = images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["alpine", "busybox"]);
        assert!(!images[0].cached);
        assert!(images[1].cached);
        assert!(images[0].size_bytes > 0);
    }

    #[test]
    fn unreadable_template_dir_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _ = write_image(dir.path(), "alpine");
        let store = ImageStore::new(dir.path());
        let image = store.resolve("alpine").expect("resolve");
        let image_root = dir.path().join("alpine");
        std::fs::create_dir(&image_root).expect("mkdir");
        std::fs::set_permissions(&image_root, std::fs::Permissions::from_mode(0o500))
            .expect("chmod");

        let result = store.materialize(&image);
        std::fs::set_permissions(&image_root, std::fs::Permissions::from_mode(0o755))
            .expect("restore");
        if !nix::unistd::geteuid().is_root() {
            assert!(matches!(result, Err(BantuboxError::ExtractionFailure { .. })));
        }
    }
}
