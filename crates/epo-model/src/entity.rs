//! Programs, studies and assays
//!
//! The hierarchy is Program → Study → Assay. A program's code is chosen by
//! the user and doubles as the prefix for its studies' codes; study and assay
//! codes are generated once, before first persistence, unless the record is
//! legacy (migrated) or the caller supplied one explicitly.

use crate::fields::{AssayType, FieldValue};
use crate::folder::{ElnFolder, ExternalLink, FolderSet, GitRepository};
use crate::ids::EntityId;
use crate::naming;
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Level in the entity hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Program,
    Study,
    Assay,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Program => "program",
            Self::Study => "study",
            Self::Assay => "assay",
        };
        f.write_str(s)
    }
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    InPlanning,
    Active,
    OnHold,
    Complete,
    Deprecated,
}

/// Created/modified bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_by: String,
    pub modified_at: DateTime<Utc>,
}

impl Audit {
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        let user = user.into();
        let now = Utc::now();
        Self {
            modified_by: user.clone(),
            created_by: user,
            created_at: now,
            modified_at: now,
        }
    }

    /// Record a modification
    pub fn touch(&mut self, user: impl Into<String>) {
        self.modified_by = user.into();
        self.modified_at = Utc::now();
    }
}

impl Default for Audit {
    fn default() -> Self {
        Self::new("system")
    }
}

/// External partner owning a study; its code prefixes external study codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub code: String,
    pub label: String,
    pub organization: String,
}

impl Collaborator {
    #[must_use]
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            code: code.into(),
            organization: label.clone(),
            label,
        }
    }
}

/// Typed reference to a persisted entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Program(EntityId),
    Study(EntityId),
    Assay(EntityId),
}

impl EntityRef {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Program(_) => EntityKind::Program,
            Self::Study(_) => EntityKind::Study,
            Self::Assay(_) => EntityKind::Assay,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Program(id) | Self::Study(id) | Self::Assay(id) => *id,
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind(), self.id())
    }
}

/// Backend-facing summary of an entity, used to derive remote names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub code: String,
    pub name: String,
    pub parent_code: Option<String>,
}

impl EntityDescriptor {
    #[must_use]
    pub fn new(kind: EntityKind, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            name: name.into(),
            parent_code: None,
        }
    }

    #[must_use]
    pub fn with_parent_code(mut self, parent_code: impl Into<String>) -> Self {
        self.parent_code = Some(parent_code.into());
        self
    }

    /// `"{code} - {sanitized name}"`
    #[must_use]
    pub fn storage_folder_name(&self) -> String {
        naming::storage_folder_name(&self.code, &self.name)
    }

    /// `"{code}: {name}"`
    #[must_use]
    pub fn notebook_folder_name(&self) -> String {
        naming::notebook_folder_name(&self.code, &self.name)
    }

    /// Repository or group name
    #[must_use]
    pub fn repository_name(&self) -> String {
        match self.kind {
            EntityKind::Program => self.code.to_lowercase(),
            EntityKind::Study | EntityKind::Assay => naming::repository_slug(&self.code, &self.name),
        }
    }

    /// Ownership tag remote folders are stamped with
    #[must_use]
    pub fn owner_key(&self) -> String {
        format!("{}:{}", self.kind, self.code)
    }
}

/// Top-level research program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: Option<EntityId>,
    pub code: String,
    pub name: String,
    pub description: String,
    pub status: Status,
    pub active: bool,
    pub audit: Audit,
    pub folders: FolderSet,
    pub eln_folder: Option<ElnFolder>,
    pub git_repository: Option<GitRepository>,
    pub links: Vec<ExternalLink>,
}

impl Program {
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            name: name.into(),
            description: String::new(),
            status: Status::Active,
            active: true,
            audit: Audit::default(),
            folders: FolderSet::new(),
            eln_folder: None,
            git_repository: None,
            links: Vec::new(),
        }
    }

    #[must_use]
    pub fn created_by(mut self, user: impl Into<String>) -> Self {
        self.audit = Audit::new(user);
        self
    }

    #[must_use]
    pub fn descriptor(&self) -> EntityDescriptor {
        EntityDescriptor::new(EntityKind::Program, &self.code, &self.name)
    }
}

/// Study within a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub id: Option<EntityId>,
    pub code: Option<String>,
    pub external_code: Option<String>,
    pub name: String,
    pub description: String,
    pub program_id: EntityId,
    pub collaborator: Option<Collaborator>,
    pub status: Status,
    pub active: bool,
    pub legacy: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub audit: Audit,
    pub folders: FolderSet,
    pub eln_folder: Option<ElnFolder>,
    pub git_repository: Option<GitRepository>,
    pub links: Vec<ExternalLink>,
}

impl Study {
    #[must_use]
    pub fn new(program_id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id: None,
            code: None,
            external_code: None,
            name: name.into(),
            description: String::new(),
            program_id,
            collaborator: None,
            status: Status::default(),
            active: true,
            legacy: false,
            start_date: None,
            end_date: None,
            audit: Audit::default(),
            folders: FolderSet::new(),
            eln_folder: None,
            git_repository: None,
            links: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_collaborator(mut self, collaborator: Collaborator) -> Self {
        self.collaborator = Some(collaborator);
        self
    }

    /// Mark as migrated from a prior system
    #[must_use]
    pub fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }

    #[must_use]
    pub fn created_by(mut self, user: impl Into<String>) -> Self {
        self.audit = Audit::new(user);
        self
    }

    /// Descriptor once a code has been assigned
    #[must_use]
    pub fn descriptor(&self, program_code: &str) -> Option<EntityDescriptor> {
        self.code.as_ref().map(|code| {
            EntityDescriptor::new(EntityKind::Study, code, &self.name).with_parent_code(program_code)
        })
    }
}

/// Assay within a study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assay {
    pub id: Option<EntityId>,
    pub code: Option<String>,
    pub name: String,
    pub description: String,
    pub study_id: EntityId,
    pub assay_type: AssayType,
    pub fields: IndexMap<String, FieldValue>,
    pub status: Status,
    pub active: bool,
    pub legacy: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub audit: Audit,
    pub folders: FolderSet,
    pub eln_folder: Option<ElnFolder>,
    pub git_repository: Option<GitRepository>,
    pub links: Vec<ExternalLink>,
}

impl Assay {
    #[must_use]
    pub fn new(study_id: EntityId, name: impl Into<String>, assay_type: AssayType) -> Self {
        Self {
            id: None,
            code: None,
            name: name.into(),
            description: String::new(),
            study_id,
            assay_type,
            fields: IndexMap::new(),
            status: Status::default(),
            active: true,
            legacy: false,
            start_date: None,
            end_date: None,
            audit: Audit::default(),
            folders: FolderSet::new(),
            eln_folder: None,
            git_repository: None,
            links: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Mark as migrated from a prior system
    #[must_use]
    pub fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }

    #[must_use]
    pub fn created_by(mut self, user: impl Into<String>) -> Self {
        self.audit = Audit::new(user);
        self
    }

    /// Descriptor once a code has been assigned
    #[must_use]
    pub fn descriptor(&self, study_code: &str) -> Option<EntityDescriptor> {
        self.code.as_ref().map(|code| {
            EntityDescriptor::new(EntityKind::Assay, code, &self.name).with_parent_code(study_code)
        })
    }
}
