//! Entity Provisioning Orchestrator
//!
//! Creates programs, studies and assays and provisions their resources in
//! external systems of record:
//! 1. Validate the request (no side effects)
//! 2. Assign a code
//! 3. Ensure the storage folder (mandatory)
//! 4. Ensure the notebook folder and summary entry (optional)
//! 5. Ensure the git repository (optional, concurrent with 4)
//! 6. Persist entity and resource references in one store transaction
//! 7. Attach convenience links (best effort)
//!
//! Failures in optional steps never abort a creation; they are returned as
//! [`ProvisioningWarning`]s on the [`ProvisioningOutcome`]. Remote resources
//! left behind by a failed persist are reconciled with the repair
//! operations.
//!
//! # Example
//!
//! ```rust,no_run
//! use epo_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run(backends: Arc<epo_backend::Backends>) -> Result<(), ProvisionError> {
//! let store = Arc::new(InMemoryEntityStore::new());
//! let orchestrator = ProvisioningOrchestrator::new(OrchestratorConfig::default(), backends, store);
//!
//! let program = orchestrator
//!     .create_program(Program::new("CPA", "Alpha"), ProvisioningOptions::new())
//!     .await?
//!     .entity;
//! let Some(program_id) = program.id else { return Ok(()) };
//! let study = Study::new(program_id, "Dose response");
//! let outcome = orchestrator.create_study(study, ProvisioningOptions::all()).await?;
//! assert_eq!(outcome.entity.code.as_deref(), Some("CPA-10001"));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod state;
pub mod store;
pub mod validation;

pub use cancel::CancellationFlag;
pub use config::{ConfigError, GitConfig, NotebookConfig, OrchestratorConfig, StorageConfig};
pub use error::{
    FieldViolation, OptionalStep, ProvisionError, ProvisioningWarning, StoreError, ValidationError,
};
pub use orchestrator::ProvisioningOrchestrator;
pub use outcome::{ProvisioningOutcome, RepairAction, RepairReport};
pub use state::{ProvisioningState, StateTrace};
pub use store::{EntityStore, InMemoryEntityStore};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the orchestrator
    pub use crate::{
        CancellationFlag, EntityStore, InMemoryEntityStore, OrchestratorConfig, ProvisionError,
        ProvisioningOrchestrator, ProvisioningOutcome, ProvisioningWarning, RepairAction,
    };
    pub use epo_model::prelude::*;
}
