//! Provisioners
//!
//! Each provisioner wraps one capability family and exposes an idempotent
//! find-or-create operation per entity:
//! - [`StorageProvisioner`]: primary and additional storage folders, file moves
//! - [`NotebookProvisioner`]: notebook folder plus summary entry
//! - [`RepositoryProvisioner`]: repository (or group, for programs)
//!
//! Every remote call is bounded by the configured backend timeout; an
//! expired bound surfaces as [`BackendError::Timeout`].
//!
//! [`BackendError::Timeout`]: epo_backend::BackendError::Timeout

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod notebook;
pub mod repository;
pub mod storage;
mod timeout;

pub use notebook::{NotebookProvisioner, NotebookProvisioning};
pub use repository::RepositoryProvisioner;
pub use storage::StorageProvisioner;
pub use timeout::bounded;
