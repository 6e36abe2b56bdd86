//! Storage folder provisioning
//!
//! Program folders are created under the deployment's program root folder,
//! study folders under the program's primary folder and assay folders under
//! the study's primary folder. The caller picks the parent; this module only
//! resolves the backend serving the parent's drive and runs the call.

use crate::timeout::bounded;
use epo_backend::{BackendError, BackendResult, BackendSlot, Backends};
use epo_model::{AdditionalFolder, EntityDescriptor, StorageDriveFolder};
use std::sync::Arc;
use std::time::Duration;

/// Find-or-create for storage folders
#[derive(Debug, Clone)]
pub struct StorageProvisioner {
    backends: Arc<Backends>,
    program_root: Option<StorageDriveFolder>,
    timeout: Duration,
}

impl StorageProvisioner {
    #[must_use]
    pub fn new(backends: Arc<Backends>, timeout: Duration) -> Self {
        Self {
            backends,
            program_root: None,
            timeout,
        }
    }

    /// Folder program folders are created under
    #[must_use]
    pub fn with_program_root(mut self, root: StorageDriveFolder) -> Self {
        self.program_root = Some(root);
        self
    }

    /// Configured program root
    ///
    /// # Errors
    /// `BackendError::NotConfigured` when no root folder is configured
    pub fn program_root(&self) -> BackendResult<&StorageDriveFolder> {
        self.program_root
            .as_ref()
            .ok_or(BackendError::NotConfigured(BackendSlot::Storage))
    }

    /// Find-or-create the entity's primary folder under `parent`
    ///
    /// # Errors
    /// - `UnknownDrive` / `NotConfigured` if the parent's drive has no backend
    /// - `PathCollision` if the derived path belongs to another entity
    /// - `RemoteCallFailed` / `Timeout` from the backend
    pub async fn ensure_folder(
        &self,
        parent: &StorageDriveFolder,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<StorageDriveFolder> {
        let (drive, backend) = self.backends.storage_for_drive(&parent.drive_id)?;
        let folder = bounded(
            "storage.ensure_folder",
            self.timeout,
            backend.ensure_folder(parent, descriptor),
        )
        .await?;
        tracing::debug!(
            entity = %descriptor.code,
            backend = backend.name(),
            path = %folder.path,
            "storage folder ensured"
        );
        Ok(folder.on_drive(drive, true))
    }

    /// Locate the entity's primary folder under `parent` without creating it
    ///
    /// # Errors
    /// Same as [`ensure_folder`](Self::ensure_folder).
    pub async fn find_folder(
        &self,
        parent: &StorageDriveFolder,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<Option<StorageDriveFolder>> {
        let (drive, backend) = self.backends.storage_for_drive(&parent.drive_id)?;
        let found = bounded(
            "storage.find_folder",
            self.timeout,
            backend.find_folder(parent, descriptor),
        )
        .await?;
        Ok(found.map(|f| f.on_drive(drive, true)))
    }

    /// Re-read a folder linked earlier; `None` if it is gone or was replaced
    ///
    /// # Errors
    /// Same as [`ensure_folder`](Self::ensure_folder).
    pub async fn get_folder(
        &self,
        linked: &StorageDriveFolder,
    ) -> BackendResult<Option<StorageDriveFolder>> {
        let (drive, backend) = self.backends.storage_for_drive(&linked.drive_id)?;
        let found = bounded("storage.get_folder", self.timeout, backend.get_folder(linked)).await?;
        Ok(found.map(|f| f.on_drive(drive, linked.primary)))
    }

    /// Find-or-create a supplementary folder on another drive or path
    ///
    /// # Errors
    /// Same as [`ensure_folder`](Self::ensure_folder).
    pub async fn ensure_additional(
        &self,
        additional: &AdditionalFolder,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<StorageDriveFolder> {
        let (drive, backend) = self.backends.storage_for_drive(&additional.drive_id)?;
        let name = additional
            .parent_path
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or_default();
        let parent = drive.folder(name, additional.parent_path.clone());
        let folder = bounded(
            "storage.ensure_additional",
            self.timeout,
            backend.ensure_folder(&parent, descriptor),
        )
        .await?;
        Ok(folder.on_drive(drive, false))
    }

    /// Move an uploaded file into `folder`, returning the new path
    ///
    /// # Errors
    /// - `NotFound` if the source file does not exist
    /// - `RemoteCallFailed` / `Timeout` from the backend
    pub async fn move_file(&self, source: &str, folder: &StorageDriveFolder) -> BackendResult<String> {
        let (_, backend) = self.backends.storage_for_drive(&folder.drive_id)?;
        bounded(
            "storage.move_file",
            self.timeout,
            backend.move_file(source, folder),
        )
        .await
    }
}
