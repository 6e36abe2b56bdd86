//! Registry keys and backend-level value types

use epo_model::{StorageDrive, StorageDriveFolder};
use serde::{Deserialize, Serialize};

/// Capability family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendSlot {
    Storage,
    Notebook,
    Git,
}

impl std::fmt::Display for BackendSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Storage => "storage",
            Self::Notebook => "notebook",
            Self::Git => "git",
        };
        f.write_str(s)
    }
}

/// Notebook integration family; the key of the notebook registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotebookIntegrationType {
    Benchling,
    Signals,
}

impl std::fmt::Display for NotebookIntegrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Benchling => "benchling",
            Self::Signals => "signals",
        };
        f.write_str(s)
    }
}

/// Git service family; the key of the git registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitServiceType {
    GitLab,
    GitHub,
}

impl std::fmt::Display for GitServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GitLab => "gitlab",
            Self::GitHub => "github",
        };
        f.write_str(s)
    }
}

/// Folder as reported by a storage backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub name: String,
    pub path: String,
    pub url: Option<String>,
    pub external_id: Option<String>,
}

impl Folder {
    /// Attach to a drive as a local folder record
    #[must_use]
    pub fn on_drive(self, drive: &StorageDrive, primary: bool) -> StorageDriveFolder {
        StorageDriveFolder {
            drive_id: drive.id.clone(),
            name: self.name,
            path: self.path,
            url: self.url,
            external_id: self.external_id,
            primary,
        }
    }
}

/// Notebook entry template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTemplate {
    pub id: String,
    pub name: String,
}

impl EntryTemplate {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
