use super::faults::FaultInjector;
use crate::error::{BackendError, BackendResult};
use crate::traits::StorageBackend;
use crate::types::Folder;
use async_trait::async_trait;
use epo_model::naming::join_path;
use epo_model::{EntityDescriptor, StorageDriveFolder};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredFolder {
    folder: Folder,
    /// `None` for folders that existed before any entity claimed them
    owner: Option<String>,
}

/// In-memory hierarchical file storage
#[derive(Debug)]
pub struct InMemoryStorageBackend {
    label: String,
    folders: Mutex<BTreeMap<String, StoredFolder>>,
    files: Mutex<BTreeSet<String>>,
    faults: FaultInjector,
    created: AtomicUsize,
}

impl InMemoryStorageBackend {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            folders: Mutex::new(BTreeMap::new()),
            files: Mutex::new(BTreeSet::new()),
            faults: FaultInjector::new(),
            created: AtomicUsize::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Put a file where an upload would land
    pub fn stage_upload(&self, path: impl Into<String>) {
        self.files.lock().insert(path.into());
    }

    #[must_use]
    pub fn has_file(&self, path: &str) -> bool {
        self.files.lock().contains(path)
    }

    /// Claim a path for another owner, e.g. to simulate a collision
    pub fn seed_foreign_folder(&self, path: impl Into<String>, owner: impl Into<String>) {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        self.folders.lock().insert(
            path.clone(),
            StoredFolder {
                folder: Folder {
                    name,
                    path,
                    url: None,
                    external_id: None,
                },
                owner: Some(owner.into()),
            },
        );
    }

    /// Drop a folder, e.g. to simulate drift after manual deletion
    pub fn remove_folder(&self, path: &str) -> bool {
        self.folders.lock().remove(path).is_some()
    }

    #[must_use]
    pub fn contains_folder(&self, path: &str) -> bool {
        self.folders.lock().contains_key(path)
    }

    #[must_use]
    pub fn folder_count(&self) -> usize {
        self.folders.lock().len()
    }

    /// Folders created through `ensure_folder`
    #[must_use]
    pub fn folders_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn lookup(&self, path: &str, descriptor: &EntityDescriptor) -> BackendResult<Option<Folder>> {
        let folders = self.folders.lock();
        match folders.get(path) {
            Some(stored) => check_owner(stored, descriptor).map(Some),
            None => Ok(None),
        }
    }
}

fn check_owner(stored: &StoredFolder, descriptor: &EntityDescriptor) -> BackendResult<Folder> {
    match stored.owner.as_deref() {
        Some(owner) if owner != descriptor.owner_key() => Err(BackendError::PathCollision {
            path: stored.folder.path.clone(),
            owner: owner.to_string(),
        }),
        _ => Ok(stored.folder.clone()),
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorageBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn find_folder(
        &self,
        parent: &StorageDriveFolder,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<Option<Folder>> {
        self.faults.before_call(&self.label, "find_folder").await?;
        let path = join_path(&parent.path, &descriptor.storage_folder_name());
        self.lookup(&path, descriptor)
    }

    async fn get_folder(&self, linked: &StorageDriveFolder) -> BackendResult<Option<Folder>> {
        self.faults.before_call(&self.label, "get_folder").await?;
        let folders = self.folders.lock();
        Ok(folders
            .get(&linked.path)
            .map(|stored| &stored.folder)
            .filter(|f| linked.external_id.is_none() || f.external_id == linked.external_id)
            .cloned())
    }

    async fn ensure_folder(
        &self,
        parent: &StorageDriveFolder,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<Folder> {
        self.faults.before_call(&self.label, "ensure_folder").await?;
        let name = descriptor.storage_folder_name();
        let path = join_path(&parent.path, &name);

        let mut folders = self.folders.lock();
        if let Some(stored) = folders.get(&path) {
            return check_owner(stored, descriptor);
        }
        let folder = Folder {
            name,
            url: Some(format!("memory://{}{}", self.label, path)),
            external_id: Some(Uuid::new_v4().to_string()),
            path: path.clone(),
        };
        folders.insert(
            path,
            StoredFolder {
                folder: folder.clone(),
                owner: Some(descriptor.owner_key()),
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(folder)
    }

    async fn move_file(&self, source: &str, folder: &StorageDriveFolder) -> BackendResult<String> {
        self.faults.before_call(&self.label, "move_file").await?;
        let mut files = self.files.lock();
        if !files.remove(source) {
            return Err(BackendError::NotFound(format!("file {source}")));
        }
        let file_name = source.rsplit('/').next().unwrap_or(source);
        let dest = join_path(&folder.path, file_name);
        files.insert(dest.clone());
        Ok(dest)
    }
}
