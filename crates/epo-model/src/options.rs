//! Per-call provisioning options

use crate::folder::{StorageDriveFolder, StorageDriveId};
use serde::{Deserialize, Serialize};

/// Supplementary (non-primary) folder to create for an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalFolder {
    pub drive_id: StorageDriveId,
    /// Folder under which the entity's folder is created
    pub parent_path: String,
}

impl AdditionalFolder {
    #[must_use]
    pub fn new(drive_id: impl Into<String>, parent_path: impl Into<String>) -> Self {
        Self {
            drive_id: StorageDriveId(drive_id.into()),
            parent_path: parent_path.into(),
        }
    }
}

/// Options for a single creation call
///
/// Constructed fresh for every call; never shared between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningOptions {
    pub use_storage: bool,
    pub use_notebook: bool,
    pub use_git: bool,
    pub notebook_template_id: Option<String>,
    /// Explicit parent folder instead of the parent entity's primary folder
    pub parent_folder: Option<StorageDriveFolder>,
    pub additional_folders: Vec<AdditionalFolder>,
}

impl ProvisioningOptions {
    /// Storage only
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage, notebook and git
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::new().with_notebook().with_git()
    }

    #[inline]
    #[must_use]
    pub fn without_storage(mut self) -> Self {
        self.use_storage = false;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_notebook(mut self) -> Self {
        self.use_notebook = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_git(mut self) -> Self {
        self.use_git = true;
        self
    }

    #[must_use]
    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.notebook_template_id = Some(template_id.into());
        self
    }

    #[must_use]
    pub fn with_parent_folder(mut self, folder: StorageDriveFolder) -> Self {
        self.parent_folder = Some(folder);
        self
    }

    #[must_use]
    pub fn with_additional_folder(mut self, folder: AdditionalFolder) -> Self {
        self.additional_folders.push(folder);
        self
    }
}

impl Default for ProvisioningOptions {
    fn default() -> Self {
        Self {
            use_storage: true,
            use_notebook: false,
            use_git: false,
            notebook_template_id: None,
            parent_folder: None,
            additional_folders: Vec::new(),
        }
    }
}
