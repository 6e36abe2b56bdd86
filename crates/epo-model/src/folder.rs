//! References to resources living in external systems of record
//!
//! An entity owns:
//! - a [`FolderSet`] of storage drive folders (at most one primary)
//! - at most one [`ElnFolder`], optionally with a summary [`NotebookEntry`]
//! - at most one [`GitRepository`]
//! - any number of [`ExternalLink`]s

use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Storage drive identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageDriveId(pub String);

impl StorageDriveId {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for StorageDriveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage backend family; the key of the storage registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageDriveType {
    /// Local or network-mounted file system
    LocalFileSystem,
    /// Object storage bucket
    S3,
    /// Hosted file-sharing service
    Egnyte,
}

impl std::fmt::Display for StorageDriveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LocalFileSystem => "local_file_system",
            Self::S3 => "s3",
            Self::Egnyte => "egnyte",
        };
        f.write_str(s)
    }
}

/// A storage drive known to the deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDrive {
    pub id: StorageDriveId,
    pub drive_type: StorageDriveType,
    pub display_name: String,
    pub root_path: String,
}

impl StorageDrive {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        drive_type: StorageDriveType,
        root_path: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id: StorageDriveId(id),
            drive_type,
            root_path: root_path.into(),
        }
    }

    /// Folder reference for a path on this drive
    #[must_use]
    pub fn folder(&self, name: impl Into<String>, path: impl Into<String>) -> StorageDriveFolder {
        StorageDriveFolder {
            drive_id: self.id.clone(),
            name: name.into(),
            path: path.into(),
            url: None,
            external_id: None,
            primary: false,
        }
    }
}

/// A folder on a specific storage drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDriveFolder {
    pub drive_id: StorageDriveId,
    pub name: String,
    pub path: String,
    pub url: Option<String>,
    pub external_id: Option<String>,
    pub primary: bool,
}

impl StorageDriveFolder {
    /// Mark as the canonical folder
    #[inline]
    #[must_use]
    pub fn into_primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// True when drive, path, name, url and external id all match
    #[must_use]
    pub fn same_location(&self, other: &Self) -> bool {
        self.drive_id == other.drive_id
            && self.path == other.path
            && self.name == other.name
            && self.url == other.url
            && self.external_id == other.external_id
    }
}

/// Storage folders owned by one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSet {
    folders: Vec<StorageDriveFolder>,
}

impl FolderSet {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a folder
    ///
    /// # Errors
    /// - `ModelError::DuplicatePrimary` if `folder` is primary and one exists
    /// - `ModelError::DuplicateFolder` if the same drive/path is already linked
    pub fn insert(&mut self, folder: StorageDriveFolder) -> Result<(), ModelError> {
        if folder.primary {
            if let Some(existing) = self.primary() {
                return Err(ModelError::DuplicatePrimary {
                    existing: existing.path.clone(),
                });
            }
        }
        if self
            .folders
            .iter()
            .any(|f| f.drive_id == folder.drive_id && f.path == folder.path)
        {
            return Err(ModelError::DuplicateFolder(folder.path));
        }
        self.folders.push(folder);
        Ok(())
    }

    /// Replace the primary folder, inserting it if none exists
    ///
    /// Returns the previous primary folder.
    pub fn replace_primary(&mut self, folder: StorageDriveFolder) -> Option<StorageDriveFolder> {
        let folder = folder.into_primary();
        // a secondary record at the same location is absorbed into the primary
        self.folders
            .retain(|f| f.primary || !(f.drive_id == folder.drive_id && f.path == folder.path));
        match self.folders.iter_mut().find(|f| f.primary) {
            Some(slot) => Some(std::mem::replace(slot, folder)),
            None => {
                self.folders.insert(0, folder);
                None
            }
        }
    }

    /// The canonical folder, if any
    #[inline]
    #[must_use]
    pub fn primary(&self) -> Option<&StorageDriveFolder> {
        self.folders.iter().find(|f| f.primary)
    }

    /// Supplementary folders
    pub fn secondary(&self) -> impl Iterator<Item = &StorageDriveFolder> {
        self.folders.iter().filter(|f| !f.primary)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StorageDriveFolder> {
        self.folders.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Summary entry created inside a notebook folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookEntry {
    pub name: String,
    pub external_id: String,
    pub url: String,
}

/// Folder in the electronic lab notebook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElnFolder {
    pub name: String,
    pub external_id: String,
    pub url: String,
    /// Hierarchy path, e.g. `"CPA: Alpha/CPA-10001: Dose response"`
    pub path: String,
    pub summary_entry: Option<NotebookEntry>,
}

impl ElnFolder {
    /// True when name, id, url and path match (summary entry ignored)
    #[must_use]
    pub fn same_location(&self, other: &Self) -> bool {
        self.name == other.name
            && self.external_id == other.external_id
            && self.url == other.url
            && self.path == other.path
    }
}

/// Source-control repository or group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRepository {
    pub name: String,
    pub url: String,
    pub web_url: String,
    pub external_id: String,
}

/// Convenience link shown alongside an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub label: String,
    pub url: String,
}

impl ExternalLink {
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}
