//! Backend capabilities and registry
//!
//! External systems of record are modeled as capability traits:
//! - [`StorageBackend`]: hierarchical file storage (mandatory for creation)
//! - [`NotebookBackend`]: electronic lab notebook (optional)
//! - [`RepositoryBackend`]: source control (optional)
//!
//! Implementations are looked up through one [`BackendRegistry`] per family,
//! keyed by a backend-type tag. Registries are assembled once at startup by
//! [`BackendsBuilder`] and are read-only afterwards; a missing registration
//! resolves to `None` ("not configured") rather than an error.
//!
//! The [`memory`] module holds in-memory reference implementations with
//! fault injection, used by tests and the simulator.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod memory;
pub mod registry;
pub mod traits;
pub mod types;

pub use error::{BackendError, BackendResult, RegistryError};
pub use registry::{
    BackendRegistry, Backends, BackendsBuilder, GitRegistry, NotebookRegistry, RegistryBuilder,
    StorageRegistry,
};
pub use traits::{NotebookBackend, RepositoryBackend, StorageBackend};
pub use types::{BackendSlot, EntryTemplate, Folder, GitServiceType, NotebookIntegrationType};
