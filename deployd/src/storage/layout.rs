//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::PlatformError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// On-disk layout of a deployd installation
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the persisted platform state file
    pub fn state_file(&self) -> File {
        File::new(self.base_dir.join("platform_data.json"))
    }

    /// Get the root under which each deployment gets its own directory
    pub fn deployments_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("deployments"))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), PlatformError> {
        self.deployments_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new(".")
    }
}
