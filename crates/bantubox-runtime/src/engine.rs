//! Runtime facade that orchestrates the container lifecycle.

use std::time::Duration;

use bantubox_common::config::BantuboxConfig;
use bantubox_common::error::Result;
use bantubox_common::types::{ContainerId, ResourceLimits};
use bantubox_core::cgroup::CgroupController;
use bantubox_image::storage::{ImageStore, ImageSummary};

use crate::container::ContainerSpec;
use crate::process::{ExitStatus, Supervisor};
use crate::state::{ContainerRegistry, RegistryEntry};

/// What `run` should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Image name, resolved under the image directory.
    pub image: String,
    /// Command line executed inside the container.
    pub command: Vec<String>,
    /// Resource limits.
    pub limits: ResourceLimits,
}

/// Coordinates all container operations over one resolved configuration.
///
/// Holds no state beyond the configuration; everything persistent lives in
/// the image and container directories.
#[derive(Debug, Clone)]
pub struct Runtime {
    config: BantuboxConfig,
    images: ImageStore,
}

impl Runtime {
    /// Creates a runtime over `config`.
    #[must_use]
    pub fn new(config: BantuboxConfig) -> Self {
        let images = ImageStore::new(config.image_dir.clone());
        Self { config, images }
    }

    /// Returns the configuration in use.
    #[must_use]
    pub const fn config(&self) -> &BantuboxConfig {
        &self.config
    }

    /// Prepares a container: resolves and materializes the image, detects
    /// the cgroup interface, then creates the registry entry and writes its
    /// metadata.
    ///
    /// Image and cgroup problems surface before anything is written under
    /// the container directory.
    ///
    /// # Errors
    ///
    /// Returns any image, cgroup, or registry error.
    pub fn create(&self, request: RunRequest) -> Result<ContainerSpec> {
        let image = self.images.prepare(&request.image)?;
        let _ = CgroupController::detect(&self.config.cgroup_root)?;

        let id = ContainerId::generate();
        let registry = self.registry();
        let spec = ContainerSpec::new(
            id.clone(),
            image,
            request.command,
            request.limits,
            registry.entry_dir(&id),
        )?;
        let _ = registry.create(&id)?;
        if let Err(e) = registry.write_metadata(&spec.metadata()) {
            if let Err(cleanup) = registry.discard(&id) {
                tracing::warn!(id = %id, error = %cleanup, "failed to discard container");
            }
            return Err(e);
        }
        tracing::info!(id = %id, image = %spec.image().name, "container created");
        Ok(spec)
    }

    /// Starts a created container and blocks until it terminates.
    ///
    /// If the container never reaches exec, its cgroup and registry entry
    /// are removed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns any supervision error.
    pub fn start(&self, spec: &ContainerSpec) -> Result<ExitStatus> {
        let cgroups = CgroupController::detect(&self.config.cgroup_root)?;
        let registry = self.registry().with_cgroups(cgroups.clone());
        let result = Supervisor::new(&registry, &cgroups).run(spec);
        if let Err(e) = &result {
            tracing::debug!(id = %spec.id(), error = %e, "discarding failed container");
            if let Err(cleanup) = registry.discard(spec.id()) {
                tracing::warn!(id = %spec.id(), error = %cleanup, "failed to discard container");
            }
        }
        result
    }

    /// Creates and runs a container to completion.
    ///
    /// # Errors
    ///
    /// See [`Self::create`] and [`Self::start`].
    pub fn run(&self, request: RunRequest) -> Result<(ContainerId, ExitStatus)> {
        let spec = self.create(request)?;
        let status = self.start(&spec)?;
        Ok((spec.id().clone(), status))
    }

    /// Stops a container and removes it.
    ///
    /// # Errors
    ///
    /// Returns [`bantubox_common::error::BantuboxError::ContainerNotFound`]
    /// if `id` is not a known container, or any signalling or removal error.
    pub fn stop(&self, id: &str, grace: Duration) -> Result<()> {
        let id = ContainerId::parse(id)?;
        self.registry_with_cgroups().stop(&id, grace)
    }

    /// Deletes a container's registry entry.
    ///
    /// # Errors
    ///
    /// Returns [`bantubox_common::error::BantuboxError::ContainerNotFound`]
    /// if `id` is not a known container, or
    /// [`bantubox_common::error::BantuboxError::ContainerRunning`] if it is
    /// alive and `force` is not set.
    pub fn delete(&self, id: &str, force: bool, grace: Duration) -> Result<()> {
        let id = ContainerId::parse(id)?;
        self.registry_with_cgroups().delete(&id, force, grace)
    }

    /// Lists every registry entry.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the container directory cannot be read.
    pub fn list(&self) -> Result<Vec<RegistryEntry>> {
        self.registry().list()
    }

    /// Lists the images available in the image directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the image directory is absent or unreadable.
    pub fn images(&self) -> Result<Vec<ImageSummary>> {
        self.images.list()
    }

    fn registry(&self) -> ContainerRegistry {
        ContainerRegistry::new(self.config.container_dir.clone())
    }

    /// Teardown removes cgroups when an interface is present; a host without
    /// one still gets its entries removed.
    fn registry_with_cgroups(&self) -> ContainerRegistry {
        match CgroupController::detect(&self.config.cgroup_root) {
            Ok(cgroups) => self.registry().with_cgroups(cgroups),
            Err(e) => {
                tracing::debug!(error = %e, "no cgroup interface, skipping cgroup removal");
                self.registry()
            }
        }
    }
}
