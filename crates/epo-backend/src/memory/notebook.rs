use super::faults::FaultInjector;
use crate::error::{BackendError, BackendResult};
use crate::traits::NotebookBackend;
use crate::types::EntryTemplate;
use async_trait::async_trait;
use epo_model::{ElnFolder, EntityDescriptor, NotebookEntry};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredFolder {
    folder: ElnFolder,
    owner: String,
}

/// In-memory electronic lab notebook
///
/// Folder faults and entry faults are separate so a test can let the folder
/// succeed while the summary entry fails.
#[derive(Debug)]
pub struct InMemoryNotebookBackend {
    label: String,
    folders: Mutex<BTreeMap<String, StoredFolder>>,
    entries: Mutex<Vec<(String, NotebookEntry)>>,
    templates: Mutex<HashMap<String, EntryTemplate>>,
    faults: FaultInjector,
    entry_faults: FaultInjector,
    created: AtomicUsize,
}

impl InMemoryNotebookBackend {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            folders: Mutex::new(BTreeMap::new()),
            entries: Mutex::new(Vec::new()),
            templates: Mutex::new(HashMap::new()),
            faults: FaultInjector::new(),
            entry_faults: FaultInjector::new(),
            created: AtomicUsize::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    #[inline]
    #[must_use]
    pub fn entry_faults(&self) -> &FaultInjector {
        &self.entry_faults
    }

    pub fn register_template(&self, template: EntryTemplate) {
        self.templates.lock().insert(template.id.clone(), template);
    }

    /// Drop a folder, e.g. to simulate drift after manual deletion
    pub fn remove_folder(&self, path: &str) -> bool {
        self.folders.lock().remove(path).is_some()
    }

    #[must_use]
    pub fn contains_folder(&self, path: &str) -> bool {
        self.folders.lock().contains_key(path)
    }

    /// Folders created through `ensure_folder`
    #[must_use]
    pub fn folders_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Summary entries created inside the folder with `folder_id`
    #[must_use]
    pub fn entries_in(&self, folder_id: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(id, _)| id == folder_id)
            .count()
    }

    fn folder_path(parent: Option<&ElnFolder>, descriptor: &EntityDescriptor) -> String {
        let name = descriptor.notebook_folder_name();
        match parent {
            Some(p) => format!("{}/{}", p.path, name),
            None => name,
        }
    }
}

fn check_owner(stored: &StoredFolder, descriptor: &EntityDescriptor) -> BackendResult<ElnFolder> {
    if stored.owner == descriptor.owner_key() {
        Ok(stored.folder.clone())
    } else {
        Err(BackendError::PathCollision {
            path: stored.folder.path.clone(),
            owner: stored.owner.clone(),
        })
    }
}

#[async_trait]
impl NotebookBackend for InMemoryNotebookBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn find_folder(
        &self,
        parent: Option<&ElnFolder>,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<Option<ElnFolder>> {
        self.faults.before_call(&self.label, "find_folder").await?;
        let path = Self::folder_path(parent, descriptor);
        let folders = self.folders.lock();
        folders
            .get(&path)
            .map(|stored| check_owner(stored, descriptor))
            .transpose()
    }

    async fn get_folder(&self, external_id: &str) -> BackendResult<Option<ElnFolder>> {
        self.faults.before_call(&self.label, "get_folder").await?;
        let folders = self.folders.lock();
        Ok(folders
            .values()
            .find(|stored| stored.folder.external_id == external_id)
            .map(|stored| stored.folder.clone()))
    }

    async fn ensure_folder(
        &self,
        parent: Option<&ElnFolder>,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<ElnFolder> {
        self.faults.before_call(&self.label, "ensure_folder").await?;
        let path = Self::folder_path(parent, descriptor);

        let mut folders = self.folders.lock();
        if let Some(stored) = folders.get(&path) {
            return check_owner(stored, descriptor);
        }
        let id = format!("lib_{}", Uuid::new_v4().simple());
        let folder = ElnFolder {
            name: descriptor.notebook_folder_name(),
            url: format!("https://eln.example.com/folders/{id}"),
            external_id: id,
            path: path.clone(),
            summary_entry: None,
        };
        folders.insert(
            path,
            StoredFolder {
                folder: folder.clone(),
                owner: descriptor.owner_key(),
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(folder)
    }

    async fn create_summary_entry(
        &self,
        folder: &ElnFolder,
        descriptor: &EntityDescriptor,
        template: Option<&EntryTemplate>,
    ) -> BackendResult<NotebookEntry> {
        self.entry_faults
            .before_call(&self.label, "create_summary_entry")
            .await?;
        let id = format!("etr_{}", Uuid::new_v4().simple());
        let name = match template {
            Some(t) => format!("{} {}", descriptor.code, t.name),
            None => format!("{} Summary", descriptor.code),
        };
        let entry = NotebookEntry {
            name,
            url: format!("https://eln.example.com/entries/{id}"),
            external_id: id,
        };
        self.entries
            .lock()
            .push((folder.external_id.clone(), entry.clone()));
        Ok(entry)
    }

    async fn find_entry_template_by_id(&self, id: &str) -> BackendResult<Option<EntryTemplate>> {
        self.faults
            .before_call(&self.label, "find_entry_template_by_id")
            .await?;
        Ok(self.templates.lock().get(id).cloned())
    }
}
