//! Error types for code generation

use epo_model::EntityKind;

/// Failure reading existing-record counts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("code counter unavailable: {0}")]
pub struct CounterError(pub String);

/// Code generation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    /// Legacy records keep the code they were migrated with
    #[error("legacy {kind} records never receive a generated code")]
    LegacyEntity { kind: EntityKind },

    /// Parent has no code to derive from
    #[error("parent {kind} has no code")]
    MissingParentCode { kind: EntityKind },

    /// Counting existing records failed
    #[error(transparent)]
    Counter(#[from] CounterError),
}
