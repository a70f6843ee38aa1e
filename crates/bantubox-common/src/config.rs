//! Global configuration model for the BantuBox runtime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{BantuboxError, Result};

/// Root configuration for the BantuBox runtime.
///
/// Resolved once at the CLI boundary and passed by value into the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BantuboxConfig {
    /// Directory holding `<name>.tar` images and their cached templates.
    pub image_dir: PathBuf,
    /// Directory holding one registry entry per container.
    pub container_dir: PathBuf,
    /// Mount point of the host cgroup filesystem.
    pub cgroup_root: PathBuf,
}

impl Default for BantuboxConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from(constants::DEFAULT_IMAGE_DIR),
            container_dir: PathBuf::from(constants::DEFAULT_CONTAINER_DIR),
            cgroup_root: PathBuf::from(constants::DEFAULT_CGROUP_ROOT),
        }
    }
}

impl BantuboxConfig {
    /// Loads a JSON configuration file. Fields absent from the file keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BantuboxError::io(path, e))?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Applies explicit overrides on top of this configuration.
    #[must_use]
    pub fn with_overrides(
        mut self,
        image_dir: Option<PathBuf>,
        container_dir: Option<PathBuf>,
        cgroup_root: Option<PathBuf>,
    ) -> Self {
        if let Some(dir) = image_dir {
            self.image_dir = dir;
        }
        if let Some(dir) = container_dir {
            self.container_dir = dir;
        }
        if let Some(dir) = cgroup_root {
            self.cgroup_root = dir;
        }
        self
    }
}
