//! Error types for backends and the registry

use crate::types::BackendSlot;
use epo_model::StorageDriveId;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by, or while reaching, an external backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// No implementation registered or selected for the slot
    #[error("{0} backend not configured")]
    NotConfigured(BackendSlot),

    /// Drive id not known to the deployment
    #[error("unknown storage drive: {0}")]
    UnknownDrive(StorageDriveId),

    /// Network, auth or server-side failure
    #[error("{backend} call failed: {message}")]
    RemoteCallFailed { backend: String, message: String },

    /// Remote call exceeded its bound
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Derived path already belongs to a different entity
    #[error("path {path} already belongs to {owner}")]
    PathCollision { path: String, owner: String },

    /// Template, folder, file or parent reference missing
    #[error("not found: {0}")]
    NotFound(String),
}

impl BackendError {
    /// Create remote failure for backend
    pub fn remote(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteCallFailed {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Transient failures a later retry or repair may fix
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RemoteCallFailed { .. } | Self::Timeout { .. })
    }

    /// Data-integrity failures that must never be silently resolved
    #[inline]
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::PathCollision { .. })
    }

    #[inline]
    #[must_use]
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured(_) | Self::UnknownDrive(_))
    }
}

/// Errors while assembling registries
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Key already registered in the family
    #[error("{slot} backend already registered for {key}")]
    DuplicateRegistration { slot: BackendSlot, key: String },

    /// Drive id declared twice
    #[error("storage drive {0} declared twice")]
    DuplicateDrive(StorageDriveId),
}
