//! Results of creation and repair runs

use crate::error::ProvisioningWarning;
use crate::state::ProvisioningState;
use epo_model::{EntityRef, RunId};

/// Successful creation: the persisted entity plus what happened on the way
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningOutcome<T> {
    pub run_id: RunId,
    pub entity: T,
    /// Visited states, `Validating` through `LinksAttached`
    pub states: Vec<ProvisioningState>,
    pub warnings: Vec<ProvisioningWarning>,
}

impl<T> ProvisioningOutcome<T> {
    /// True when every requested step succeeded
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    #[must_use]
    pub fn visited(&self, state: ProvisioningState) -> bool {
        self.states.contains(&state)
    }

    /// Discard run details
    #[inline]
    pub fn into_entity(self) -> T {
        self.entity
    }
}

/// What a repair did to the local record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairAction {
    /// No local record existed; one was added
    Created,
    /// Local record pointed elsewhere; it was rewritten
    Corrected,
    /// Local record already matched the remote folder
    Unchanged,
}

/// Result of a repair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub entity: EntityRef,
    pub action: RepairAction,
    /// Remote location after the repair
    pub location: String,
}
