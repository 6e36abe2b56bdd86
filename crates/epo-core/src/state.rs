//! Provisioning state machine
//!
//! ```text
//! Validating -> CodeAssigned -> StorageProvisioned -> [NotebookProvisioned]
//!            -> [RepositoryProvisioned] -> Persisted -> LinksAttached
//! ```
//!
//! Bracketed states are skipped when the integration is not requested or
//! not configured. Storage is skipped only when the caller opts out. Any
//! state before `Persisted` may move to `Aborted`.

use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};

/// Step of a creation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningState {
    Validating,
    CodeAssigned,
    StorageProvisioned,
    NotebookProvisioned,
    RepositoryProvisioned,
    Persisted,
    LinksAttached,
    Aborted,
}

impl ProvisioningState {
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::LinksAttached | Self::Aborted)
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validating => "validating",
            Self::CodeAssigned => "code_assigned",
            Self::StorageProvisioned => "storage_provisioned",
            Self::NotebookProvisioned => "notebook_provisioned",
            Self::RepositoryProvisioned => "repository_provisioned",
            Self::Persisted => "persisted",
            Self::LinksAttached => "links_attached",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: ProvisioningState) -> Vec<ProvisioningState> {
    use ProvisioningState::{
        Aborted, CodeAssigned, LinksAttached, NotebookProvisioned, Persisted,
        RepositoryProvisioned, StorageProvisioned, Validating,
    };
    match from {
        Validating => vec![CodeAssigned, Aborted],
        CodeAssigned => vec![
            StorageProvisioned,
            NotebookProvisioned,
            RepositoryProvisioned,
            Persisted,
            Aborted,
        ],
        StorageProvisioned => vec![NotebookProvisioned, RepositoryProvisioned, Persisted, Aborted],
        NotebookProvisioned => vec![RepositoryProvisioned, Persisted, Aborted],
        RepositoryProvisioned => vec![Persisted, Aborted],
        Persisted => vec![LinksAttached],
        LinksAttached | Aborted => vec![],
    }
}

/// Check a single transition
///
/// # Errors
/// `ProvisionError::IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(
    from: ProvisioningState,
    to: ProvisioningState,
) -> Result<(), ProvisionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ProvisionError::IllegalTransition { from, to })
    }
}

/// Visited states of one run, starting at `Validating`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrace {
    states: Vec<ProvisioningState>,
}

impl StateTrace {
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: vec![ProvisioningState::Validating],
        }
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> ProvisioningState {
        self.states
            .last()
            .copied()
            .unwrap_or(ProvisioningState::Validating)
    }

    /// Move to `to`
    ///
    /// # Errors
    /// `ProvisionError::IllegalTransition` if `to` is not reachable
    pub fn advance(&mut self, to: ProvisioningState) -> Result<(), ProvisionError> {
        validate_transition(self.current(), to)?;
        tracing::debug!(from = %self.current(), %to, "provisioning state");
        self.states.push(to);
        Ok(())
    }

    /// Record an abort; no-op once persisted or already terminal
    pub fn abort(&mut self) {
        if allowed_transitions(self.current()).contains(&ProvisioningState::Aborted) {
            self.states.push(ProvisioningState::Aborted);
        }
    }

    #[must_use]
    pub fn states(&self) -> &[ProvisioningState] {
        &self.states
    }

    #[must_use]
    pub fn into_states(self) -> Vec<ProvisioningState> {
        self.states
    }
}

impl Default for StateTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ProvisioningState::*;

    const ALL: [ProvisioningState; 8] = [
        Validating,
        CodeAssigned,
        StorageProvisioned,
        NotebookProvisioned,
        RepositoryProvisioned,
        Persisted,
        LinksAttached,
        Aborted,
    ];

    #[test]
    fn full_run() {
        let mut trace = StateTrace::new();
        for s in [
            CodeAssigned,
            StorageProvisioned,
            NotebookProvisioned,
            RepositoryProvisioned,
            Persisted,
            LinksAttached,
        ] {
            trace.advance(s).unwrap();
        }
        assert!(trace.current().is_terminal());
        assert_eq!(trace.states().len(), 7);
    }

    #[test]
    fn storage_cannot_be_revisited() {
        let mut trace = StateTrace::new();
        trace.advance(CodeAssigned).unwrap();
        trace.advance(NotebookProvisioned).unwrap();
        assert!(matches!(
            trace.advance(StorageProvisioned),
            Err(ProvisionError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn abort_after_persist_is_ignored() {
        let mut trace = StateTrace::new();
        trace.advance(CodeAssigned).unwrap();
        trace.advance(Persisted).unwrap();
        trace.abort();
        assert_eq!(trace.current(), Persisted);
    }

    proptest! {
        #[test]
        fn terminal_states_have_no_exits(i in 0usize..ALL.len()) {
            let s = ALL[i];
            prop_assert_eq!(s.is_terminal(), allowed_transitions(s).is_empty());
        }

        #[test]
        fn nothing_returns_to_validating(i in 0usize..ALL.len()) {
            prop_assert!(validate_transition(ALL[i], Validating).is_err());
        }
    }
}
