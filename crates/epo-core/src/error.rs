//! Error types for the orchestrator
//!
//! - [`ProvisionError`]: why a creation, update or repair did not complete
//! - [`ValidationError`]: request rejected before any side effect
//! - [`StoreError`]: local persistence failures
//! - [`ProvisioningWarning`]: optional-step failures that did not abort

use crate::state::ProvisioningState;
use epo_backend::BackendError;
use epo_codegen::CodeError;
use epo_model::{EntityId, EntityKind, EntityRef, FieldType};

/// Main orchestrator error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProvisionError {
    /// Request rejected before any side effect
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Code generation failed
    #[error("code generation failed: {0}")]
    Code(#[from] CodeError),

    /// Storage folder could not be provisioned; nothing was persisted
    #[error("storage provisioning failed for {entity}: {source}")]
    MandatoryProvisioning {
        entity: String,
        source: BackendError,
    },

    /// Local save failed after remote resources were created
    ///
    /// Raised for any save failure at that point, not only uniqueness
    /// violations. [`is_code_collision`](Self::is_code_collision) tells the
    /// two apart; an outage here is retryable, a collision is not.
    #[error("could not persist {code}: {source}")]
    PersistenceConflict {
        code: String,
        /// Remote resources left without a local record
        orphaned: Vec<String>,
        source: StoreError,
    },

    /// Other persistence failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Repair could not reach or create the remote resource
    #[error("repair failed for {entity}: {source}")]
    RepairFailed {
        entity: EntityRef,
        source: BackendError,
    },

    /// Update or repair target does not exist
    #[error("{0} not found")]
    NotFound(EntityRef),

    /// Internal sequencing bug
    #[error("illegal provisioning transition {from} -> {to}")]
    IllegalTransition {
        from: ProvisioningState,
        to: ProvisioningState,
    },

    /// Caller cancelled the run
    #[error("provisioning cancelled")]
    Cancelled,
}

impl ProvisionError {
    /// Check if a later attempt may succeed without changing the request
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MandatoryProvisioning { source, .. } | Self::RepairFailed { source, .. } => {
                source.is_recoverable()
            }
            Self::Store(err) | Self::PersistenceConflict { source: err, .. } => err.is_transient(),
            Self::Code(CodeError::Counter(_)) => true,
            _ => false,
        }
    }

    /// Check if a save lost a uniqueness race after provisioning
    #[inline]
    #[must_use]
    pub fn is_code_collision(&self) -> bool {
        matches!(self, Self::PersistenceConflict { source, .. } if source.is_unique_violation())
    }

    /// Check if the message is meant for the requesting user rather than
    /// operators
    #[inline]
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::MandatoryProvisioning { .. }
                | Self::PersistenceConflict { .. }
                | Self::Cancelled
        )
    }
}

/// Request validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} name must not be blank")]
    BlankName { kind: EntityKind },

    #[error("{kind} code must not be blank")]
    BlankCode { kind: EntityKind },

    #[error("{kind} code {code} is already in use")]
    DuplicateCode { kind: EntityKind, code: String },

    #[error("{kind} name {name} is already in use")]
    DuplicateName { kind: EntityKind, name: String },

    /// Parent missing, inactive or incomplete
    #[error("invalid parent for {kind}: {reason}")]
    InvalidParent { kind: EntityKind, reason: String },

    #[error("legacy {kind} records must carry an explicit code")]
    LegacyWithoutCode { kind: EntityKind },

    #[error("{kind} is already persisted with id {id}")]
    AlreadyPersisted { kind: EntityKind, id: EntityId },

    #[error("{kind} has no id")]
    MissingId { kind: EntityKind },

    #[error("custom fields invalid: {}", join_violations(.0))]
    FieldSchema(Vec<FieldViolation>),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Single custom-field schema violation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldViolation {
    #[error("required field {field} is missing")]
    MissingRequired { field: String },

    #[error("field {field} is not declared by the assay type")]
    UnknownField { field: String },

    #[error("field {field} expects {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: FieldType,
    },

    #[error("{value} is not an option of field {field}")]
    InvalidOption { field: String, value: String },
}

/// Local persistence errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Uniqueness constraint on codes
    #[error("{kind} code {code} already exists")]
    DuplicateCode { kind: EntityKind, code: String },

    /// Uniqueness constraint on program names
    #[error("{kind} name {name} already exists")]
    DuplicateName { kind: EntityKind, name: String },

    /// Update of a record that does not exist
    #[error("{0} does not exist")]
    Missing(EntityRef),

    /// Store unreachable or transaction aborted
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    #[inline]
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::DuplicateCode { .. } | Self::DuplicateName { .. })
    }
}

/// Optional step that may fail without aborting a creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionalStep {
    AdditionalFolder,
    NotebookFolder,
    NotebookEntry,
    Repository,
}

impl std::fmt::Display for OptionalStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AdditionalFolder => "additional folder",
            Self::NotebookFolder => "notebook folder",
            Self::NotebookEntry => "notebook summary entry",
            Self::Repository => "repository",
        };
        f.write_str(s)
    }
}

/// Non-fatal failure recorded on an outcome
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisioningWarning {
    #[error("{step} not provisioned: {source}")]
    OptionalProvisioningFailure {
        step: OptionalStep,
        source: BackendError,
    },

    #[error("link {label} not attached: {source}")]
    LinkAttachmentFailure { label: String, source: StoreError },

    /// Upload left at its temporary location
    #[error("file for field {field} not moved: {source}")]
    FileMoveFailure { field: String, source: BackendError },
}

impl ProvisioningWarning {
    /// Optional step this warning belongs to, if any
    #[must_use]
    pub fn step(&self) -> Option<OptionalStep> {
        match self {
            Self::OptionalProvisioningFailure { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epo_backend::BackendSlot;

    #[test]
    fn retryable_follows_backend_classification() {
        let remote = ProvisionError::MandatoryProvisioning {
            entity: "CPA-10001".into(),
            source: BackendError::remote("fs", "503"),
        };
        assert!(remote.is_retryable());
        assert!(remote.is_user_visible());

        let unconfigured = ProvisionError::MandatoryProvisioning {
            entity: "CPA-10001".into(),
            source: BackendError::NotConfigured(BackendSlot::Storage),
        };
        assert!(!unconfigured.is_retryable());

        assert!(!ProvisionError::from(ValidationError::BlankName {
            kind: EntityKind::Study
        })
        .is_retryable());
        assert!(ProvisionError::Store(StoreError::Unavailable("down".into())).is_retryable());
    }

    #[test]
    fn persistence_conflict_separates_collisions_from_outages() {
        let collision = ProvisionError::PersistenceConflict {
            code: "CPA-10001".into(),
            orphaned: vec!["/data/programs/CPA - Alpha/CPA-10001 - Dose_response".into()],
            source: StoreError::DuplicateCode {
                kind: EntityKind::Study,
                code: "CPA-10001".into(),
            },
        };
        assert!(collision.is_code_collision());
        assert!(!collision.is_retryable());

        let outage = ProvisionError::PersistenceConflict {
            code: "CPA-10001".into(),
            orphaned: Vec::new(),
            source: StoreError::Unavailable("down".into()),
        };
        assert!(!outage.is_code_collision());
        assert!(outage.is_retryable());
        assert!(!ProvisionError::Cancelled.is_code_collision());
    }

    #[test]
    fn store_errors_are_internal() {
        let err = ProvisionError::Store(StoreError::Unavailable("down".into()));
        assert!(!err.is_user_visible());
    }

    #[test]
    fn field_schema_message_lists_violations() {
        let err = ValidationError::FieldSchema(vec![
            FieldViolation::MissingRequired {
                field: "plate".into(),
            },
            FieldViolation::UnknownField { field: "x".into() },
        ]);
        assert_eq!(
            err.to_string(),
            "custom fields invalid: required field plate is missing; field x is not declared by the assay type"
        );
    }

    #[test]
    fn warning_step() {
        let w = ProvisioningWarning::OptionalProvisioningFailure {
            step: OptionalStep::Repository,
            source: BackendError::remote("git", "500"),
        };
        assert_eq!(w.step(), Some(OptionalStep::Repository));
        assert_eq!(w.to_string(), "repository not provisioned: git call failed: 500");
    }
}
