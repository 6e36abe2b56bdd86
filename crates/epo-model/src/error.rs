//! Model-level invariant errors

/// Violations of record invariants
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A second primary folder was added to a folder set
    #[error("entity already has a primary folder at {existing}")]
    DuplicatePrimary { existing: String },

    /// The same folder path was added twice
    #[error("folder {0} is already linked")]
    DuplicateFolder(String),
}
