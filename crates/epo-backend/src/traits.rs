//! Capability traits for external systems of record

use crate::error::BackendResult;
use crate::types::{EntryTemplate, Folder};
use async_trait::async_trait;
use epo_model::{ElnFolder, EntityDescriptor, GitRepository, NotebookEntry, StorageDriveFolder};

/// Hierarchical file storage
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Locate the entity's folder under `parent`
    async fn find_folder(
        &self,
        parent: &StorageDriveFolder,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<Option<Folder>>;

    /// Look up a folder recorded earlier by its path
    ///
    /// `None` when nothing exists at the path any more, or when the folder
    /// there has a different external id than the one recorded.
    async fn get_folder(&self, linked: &StorageDriveFolder) -> BackendResult<Option<Folder>>;

    /// Find-or-create the entity's folder under `parent`
    async fn ensure_folder(
        &self,
        parent: &StorageDriveFolder,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<Folder>;

    /// Move an uploaded file into `folder`, returning its new path
    async fn move_file(&self, source: &str, folder: &StorageDriveFolder) -> BackendResult<String>;
}

/// Electronic lab notebook
#[async_trait]
pub trait NotebookBackend: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Locate the entity's folder; `parent` is `None` for programs
    async fn find_folder(
        &self,
        parent: Option<&ElnFolder>,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<Option<ElnFolder>>;

    /// Look up a folder recorded earlier by its external id
    async fn get_folder(&self, external_id: &str) -> BackendResult<Option<ElnFolder>>;

    /// Find-or-create the entity's folder; `parent` is `None` for programs
    async fn ensure_folder(
        &self,
        parent: Option<&ElnFolder>,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<ElnFolder>;

    /// Create the summary entry inside `folder`
    async fn create_summary_entry(
        &self,
        folder: &ElnFolder,
        descriptor: &EntityDescriptor,
        template: Option<&EntryTemplate>,
    ) -> BackendResult<NotebookEntry>;

    async fn find_entry_template_by_id(&self, id: &str) -> BackendResult<Option<EntryTemplate>>;
}

/// Source-control service
#[async_trait]
pub trait RepositoryBackend: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    async fn find_repository(
        &self,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<Option<GitRepository>>;

    /// Create a repository (a group for programs)
    async fn create_repository(&self, descriptor: &EntityDescriptor)
        -> BackendResult<GitRepository>;
}
