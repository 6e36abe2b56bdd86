//! Backend registries
//!
//! Provides [`BackendRegistry`] for mapping a backend-type tag to a capability
//! implementation, and [`Backends`], the bundle of all three families that is
//! injected into the orchestrator.

use crate::error::{BackendError, RegistryError};
use crate::traits::{NotebookBackend, RepositoryBackend, StorageBackend};
use crate::types::{BackendSlot, GitServiceType, NotebookIntegrationType};
use epo_model::{StorageDrive, StorageDriveId, StorageDriveType};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// Storage registry keyed by drive type
pub type StorageRegistry = BackendRegistry<StorageDriveType, dyn StorageBackend>;
/// Notebook registry keyed by integration type
pub type NotebookRegistry = BackendRegistry<NotebookIntegrationType, dyn NotebookBackend>;
/// Git registry keyed by service type
pub type GitRegistry = BackendRegistry<GitServiceType, dyn RepositoryBackend>;

/// Read-only map from backend-type tag to implementation
///
/// Built once through [`RegistryBuilder`]; there is no way to register on a
/// built registry.
pub struct BackendRegistry<K, C: ?Sized> {
    entries: HashMap<K, Arc<C>>,
}

impl<K, C> BackendRegistry<K, C>
where
    K: Eq + Hash + Clone + Display,
    C: ?Sized,
{
    /// Registry with no registrations
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn builder(slot: BackendSlot) -> RegistryBuilder<K, C> {
        RegistryBuilder::new(slot)
    }

    /// Implementation registered for `key`, or `None` when not configured
    #[inline]
    #[must_use]
    pub fn resolve(&self, key: &K) -> Option<Arc<C>> {
        self.entries.get(key).cloned()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys, sorted by display name
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        let mut keys: Vec<K> = self.entries.keys().cloned().collect();
        keys.sort_by_key(ToString::to_string);
        keys
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, C> std::fmt::Debug for BackendRegistry<K, C>
where
    K: Eq + Hash + Clone + Display,
    C: ?Sized,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.keys().iter().map(ToString::to_string))
            .finish()
    }
}

/// Mutable stage of a [`BackendRegistry`]
pub struct RegistryBuilder<K, C: ?Sized> {
    slot: BackendSlot,
    entries: HashMap<K, Arc<C>>,
}

impl<K, C> RegistryBuilder<K, C>
where
    K: Eq + Hash + Clone + Display,
    C: ?Sized,
{
    #[must_use]
    pub fn new(slot: BackendSlot) -> Self {
        Self {
            slot,
            entries: HashMap::new(),
        }
    }

    /// Register an implementation. Fails if the key is already taken.
    pub fn register(&mut self, key: K, backend: Arc<C>) -> Result<&mut Self, RegistryError> {
        if self.entries.contains_key(&key) {
            return Err(RegistryError::DuplicateRegistration {
                slot: self.slot,
                key: key.to_string(),
            });
        }
        self.entries.insert(key, backend);
        Ok(self)
    }

    /// Freeze into a read-only registry
    #[must_use]
    pub fn build(self) -> BackendRegistry<K, C> {
        BackendRegistry {
            entries: self.entries,
        }
    }
}

/// All configured backends plus the deployment's drive table
///
/// Read-only after construction and safe to share behind an `Arc`.
#[derive(Debug)]
pub struct Backends {
    storage: StorageRegistry,
    notebook: NotebookRegistry,
    git: GitRegistry,
    drives: BTreeMap<StorageDriveId, StorageDrive>,
    notebook_selection: Option<NotebookIntegrationType>,
    git_selection: Option<GitServiceType>,
}

impl Backends {
    #[inline]
    #[must_use]
    pub fn builder() -> BackendsBuilder {
        BackendsBuilder::new()
    }

    /// Nothing registered
    #[must_use]
    pub fn none() -> Self {
        BackendsBuilder::new().build()
    }

    #[inline]
    #[must_use]
    pub fn drive(&self, id: &StorageDriveId) -> Option<&StorageDrive> {
        self.drives.get(id)
    }

    pub fn drives(&self) -> impl Iterator<Item = &StorageDrive> {
        self.drives.values()
    }

    /// Storage implementation for the drive, resolved through its type
    ///
    /// # Errors
    /// - `BackendError::UnknownDrive` if the drive id is not declared
    /// - `BackendError::NotConfigured` if no backend serves the drive type
    pub fn storage_for_drive(
        &self,
        id: &StorageDriveId,
    ) -> Result<(&StorageDrive, Arc<dyn StorageBackend>), BackendError> {
        let drive = self
            .drives
            .get(id)
            .ok_or_else(|| BackendError::UnknownDrive(id.clone()))?;
        let backend = self
            .storage
            .resolve(&drive.drive_type)
            .ok_or(BackendError::NotConfigured(BackendSlot::Storage))?;
        Ok((drive, backend))
    }

    /// Selected notebook implementation, if registered
    #[must_use]
    pub fn notebook(&self) -> Option<Arc<dyn NotebookBackend>> {
        self.notebook_selection
            .and_then(|ty| self.notebook.resolve(&ty))
    }

    /// Selected git implementation, if registered
    #[must_use]
    pub fn git(&self) -> Option<Arc<dyn RepositoryBackend>> {
        self.git_selection.and_then(|ty| self.git.resolve(&ty))
    }

    /// Whether the slot resolves to an implementation
    #[must_use]
    pub fn is_configured(&self, slot: BackendSlot) -> bool {
        match slot {
            BackendSlot::Storage => self
                .drives
                .values()
                .any(|d| self.storage.contains(&d.drive_type)),
            BackendSlot::Notebook => self.notebook().is_some(),
            BackendSlot::Git => self.git().is_some(),
        }
    }

    #[inline]
    #[must_use]
    pub fn storage_registry(&self) -> &StorageRegistry {
        &self.storage
    }

    #[inline]
    #[must_use]
    pub fn notebook_selection(&self) -> Option<NotebookIntegrationType> {
        self.notebook_selection
    }

    #[inline]
    #[must_use]
    pub fn git_selection(&self) -> Option<GitServiceType> {
        self.git_selection
    }
}

/// Startup-time assembly of [`Backends`]
pub struct BackendsBuilder {
    storage: RegistryBuilder<StorageDriveType, dyn StorageBackend>,
    notebook: RegistryBuilder<NotebookIntegrationType, dyn NotebookBackend>,
    git: RegistryBuilder<GitServiceType, dyn RepositoryBackend>,
    drives: BTreeMap<StorageDriveId, StorageDrive>,
    notebook_selection: Option<NotebookIntegrationType>,
    git_selection: Option<GitServiceType>,
}

impl BackendsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: RegistryBuilder::new(BackendSlot::Storage),
            notebook: RegistryBuilder::new(BackendSlot::Notebook),
            git: RegistryBuilder::new(BackendSlot::Git),
            drives: BTreeMap::new(),
            notebook_selection: None,
            git_selection: None,
        }
    }

    pub fn register_storage(
        &mut self,
        drive_type: StorageDriveType,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<&mut Self, RegistryError> {
        self.storage.register(drive_type, backend)?;
        Ok(self)
    }

    pub fn register_notebook(
        &mut self,
        integration: NotebookIntegrationType,
        backend: Arc<dyn NotebookBackend>,
    ) -> Result<&mut Self, RegistryError> {
        self.notebook.register(integration, backend)?;
        Ok(self)
    }

    pub fn register_git(
        &mut self,
        service: GitServiceType,
        backend: Arc<dyn RepositoryBackend>,
    ) -> Result<&mut Self, RegistryError> {
        self.git.register(service, backend)?;
        Ok(self)
    }

    /// Declare a storage drive
    pub fn add_drive(&mut self, drive: StorageDrive) -> Result<&mut Self, RegistryError> {
        if self.drives.contains_key(&drive.id) {
            return Err(RegistryError::DuplicateDrive(drive.id));
        }
        self.drives.insert(drive.id.clone(), drive);
        Ok(self)
    }

    /// Active notebook integration; `None` disables the notebook step
    pub fn select_notebook(&mut self, integration: Option<NotebookIntegrationType>) -> &mut Self {
        self.notebook_selection = integration;
        self
    }

    /// Active git service; `None` disables the git step
    pub fn select_git(&mut self, service: Option<GitServiceType>) -> &mut Self {
        self.git_selection = service;
        self
    }

    #[must_use]
    pub fn build(self) -> Backends {
        let backends = Backends {
            storage: self.storage.build(),
            notebook: self.notebook.build(),
            git: self.git.build(),
            drives: self.drives,
            notebook_selection: self.notebook_selection,
            git_selection: self.git_selection,
        };
        if let Some(ty) = backends.notebook_selection {
            if !backends.notebook.contains(&ty) {
                tracing::warn!(integration = %ty, "notebook integration selected but not registered");
            }
        }
        if let Some(ty) = backends.git_selection {
            if !backends.git.contains(&ty) {
                tracing::warn!(service = %ty, "git service selected but not registered");
            }
        }
        for drive in backends.drives.values() {
            if !backends.storage.contains(&drive.drive_type) {
                tracing::warn!(drive = %drive.id, drive_type = %drive.drive_type, "no storage backend for drive");
            }
        }
        backends
    }
}

impl Default for BackendsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryNotebookBackend, InMemoryRepositoryBackend, InMemoryStorageBackend};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn drive() -> StorageDrive {
        StorageDrive::new("local", StorageDriveType::LocalFileSystem, "/data")
    }

    #[test]
    fn registry_resolve_and_miss() {
        let mut builder = StorageRegistry::builder(BackendSlot::Storage);
        builder
            .register(
                StorageDriveType::LocalFileSystem,
                Arc::new(InMemoryStorageBackend::new("fs")),
            )
            .unwrap();
        let registry = builder.build();

        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(&StorageDriveType::LocalFileSystem).is_some());
        assert!(registry.resolve(&StorageDriveType::S3).is_none());
    }

    #[test]
    fn registry_duplicate_registration_fails() {
        let mut builder = GitRegistry::builder(BackendSlot::Git);
        builder
            .register(GitServiceType::GitLab, Arc::new(InMemoryRepositoryBackend::new("a")))
            .unwrap();
        let err = builder
            .register(GitServiceType::GitLab, Arc::new(InMemoryRepositoryBackend::new("b")))
            .err()
            .unwrap();
        assert_eq!(
            err,
            RegistryError::DuplicateRegistration {
                slot: BackendSlot::Git,
                key: "gitlab".into()
            }
        );
    }

    #[test]
    fn registry_keys_sorted() {
        let mut builder = StorageRegistry::builder(BackendSlot::Storage);
        builder
            .register(StorageDriveType::S3, Arc::new(InMemoryStorageBackend::new("s3")))
            .unwrap()
            .register(
                StorageDriveType::Egnyte,
                Arc::new(InMemoryStorageBackend::new("eg")),
            )
            .unwrap();
        let keys = builder.build().keys();
        assert_eq!(keys, vec![StorageDriveType::Egnyte, StorageDriveType::S3]);
    }

    #[test]
    fn backends_storage_for_drive() {
        let mut builder = Backends::builder();
        builder
            .add_drive(drive())
            .unwrap()
            .register_storage(
                StorageDriveType::LocalFileSystem,
                Arc::new(InMemoryStorageBackend::new("fs")),
            )
            .unwrap();
        let backends = builder.build();

        let (d, backend) = backends
            .storage_for_drive(&StorageDriveId::new("local"))
            .unwrap();
        assert_eq!(d.root_path, "/data");
        assert_eq!(backend.name(), "fs");

        assert!(matches!(
            backends.storage_for_drive(&StorageDriveId::new("nope")),
            Err(BackendError::UnknownDrive(_))
        ));
        assert!(backends.is_configured(BackendSlot::Storage));
    }

    #[test]
    fn backends_drive_without_backend_is_not_configured() {
        let mut builder = Backends::builder();
        builder
            .add_drive(StorageDrive::new("bucket", StorageDriveType::S3, "/"))
            .unwrap();
        let backends = builder.build();

        assert!(matches!(
            backends.storage_for_drive(&StorageDriveId::new("bucket")),
            Err(BackendError::NotConfigured(BackendSlot::Storage))
        ));
        assert!(!backends.is_configured(BackendSlot::Storage));
    }

    #[test]
    fn backends_duplicate_drive() {
        let mut builder = Backends::builder();
        builder.add_drive(drive()).unwrap();
        assert!(matches!(
            builder.add_drive(drive()),
            Err(RegistryError::DuplicateDrive(_))
        ));
    }

    #[test]
    fn notebook_requires_selection_and_registration() {
        let mut builder = Backends::builder();
        builder
            .register_notebook(
                NotebookIntegrationType::Benchling,
                Arc::new(InMemoryNotebookBackend::new("eln")),
            )
            .unwrap();
        let unselected = builder.build();
        assert!(unselected.notebook().is_none());
        assert!(!unselected.is_configured(BackendSlot::Notebook));

        let mut builder = Backends::builder();
        builder.select_notebook(Some(NotebookIntegrationType::Benchling));
        assert!(builder.build().notebook().is_none());

        let mut builder = Backends::builder();
        builder
            .register_notebook(
                NotebookIntegrationType::Benchling,
                Arc::new(InMemoryNotebookBackend::new("eln")),
            )
            .unwrap()
            .select_notebook(Some(NotebookIntegrationType::Benchling));
        assert!(builder.build().is_configured(BackendSlot::Notebook));
    }

    #[test]
    fn none_has_nothing() {
        let backends = Backends::none();
        assert!(backends.git().is_none());
        assert!(backends.notebook().is_none());
        assert_eq!(backends.drives().count(), 0);
    }

    proptest! {
        /// The first registration of a key wins, later ones are rejected, and
        /// the frozen registry resolves exactly the registered keys.
        #[test]
        fn prop_resolve_matches_registrations(keys in prop::collection::vec("[a-d]", 0..12)) {
            let mut builder: RegistryBuilder<String, str> =
                RegistryBuilder::new(BackendSlot::Storage);
            let mut seen = BTreeSet::new();
            for (i, key) in keys.iter().enumerate() {
                let value: Arc<str> = Arc::from(format!("{key}#{i}"));
                let accepted = builder.register(key.clone(), value).is_ok();
                prop_assert_eq!(accepted, seen.insert(key.clone()));
            }
            let registry = builder.build();

            prop_assert_eq!(registry.keys(), seen.iter().cloned().collect::<Vec<_>>());
            for key in ["a", "b", "c", "d"] {
                let key = key.to_string();
                let first = keys.iter().position(|k| *k == key);
                let resolved = registry.resolve(&key);
                prop_assert_eq!(resolved.is_some(), first.is_some());
                if let (Some(i), Some(value)) = (first, resolved) {
                    let expected = format!("{key}#{i}");
                    prop_assert_eq!(&*value, expected.as_str());
                }
            }
        }
    }
}
