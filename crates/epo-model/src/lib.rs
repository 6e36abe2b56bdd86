//! Data model for the entity provisioning workspace
//!
//! Defines the records the orchestrator creates and the references it
//! resolves against external systems:
//! - Programs, studies and assays (the three-level entity hierarchy)
//! - Storage drive folders, notebook folders and git repositories
//! - Assay type field schemas and custom field values
//! - Per-call provisioning options
//!
//! # Example
//!
//! ```rust
//! use epo_model::{EntityDescriptor, EntityKind};
//!
//! let descriptor = EntityDescriptor::new(EntityKind::Study, "CPA-10001", "Dose response (rat)")
//!     .with_parent_code("CPA");
//!
//! assert_eq!(descriptor.storage_folder_name(), "CPA-10001 - Dose_response__rat_");
//! assert_eq!(descriptor.notebook_folder_name(), "CPA-10001: Dose response (rat)");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod entity;
pub mod error;
pub mod fields;
pub mod folder;
pub mod ids;
pub mod naming;
pub mod options;

pub use entity::{
    Assay, Audit, Collaborator, EntityDescriptor, EntityKind, EntityRef, Program, Status, Study,
};
pub use error::ModelError;
pub use fields::{AssayType, CustomFieldDef, FieldType, FieldValue, FileRef};
pub use folder::{
    ElnFolder, ExternalLink, FolderSet, GitRepository, NotebookEntry, StorageDrive,
    StorageDriveFolder, StorageDriveId, StorageDriveType,
};
pub use ids::{EntityId, RunId};
pub use options::{AdditionalFolder, ProvisioningOptions};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the entity model
    pub use crate::{
        Assay, AssayType, EntityDescriptor, EntityId, EntityKind, EntityRef, FieldType,
        FieldValue, Program, ProvisioningOptions, Status, StorageDriveFolder, Study,
    };
}
