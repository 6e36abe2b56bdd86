//! Repository provisioning

use crate::timeout::bounded;
use epo_backend::{BackendError, BackendResult, BackendSlot, RepositoryBackend};
use epo_model::{EntityDescriptor, GitRepository};
use std::sync::Arc;
use std::time::Duration;

/// Find-or-create for repositories
#[derive(Clone)]
pub struct RepositoryProvisioner {
    backend: Option<Arc<dyn RepositoryBackend>>,
    timeout: Duration,
}

impl std::fmt::Debug for RepositoryProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryProvisioner")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RepositoryProvisioner {
    #[must_use]
    pub fn new(backend: Option<Arc<dyn RepositoryBackend>>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    #[inline]
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Existing repository for the entity, else a new one
    ///
    /// # Errors
    /// `NotConfigured`, `RemoteCallFailed` or `Timeout`
    pub async fn ensure_repository(&self, descriptor: &EntityDescriptor) -> BackendResult<GitRepository> {
        let backend = self
            .backend
            .as_ref()
            .ok_or(BackendError::NotConfigured(BackendSlot::Git))?;

        if let Some(existing) = bounded(
            "git.find_repository",
            self.timeout,
            backend.find_repository(descriptor),
        )
        .await?
        {
            tracing::debug!(entity = %descriptor.code, repo = %existing.web_url, "repository exists");
            return Ok(existing);
        }
        bounded(
            "git.create_repository",
            self.timeout,
            backend.create_repository(descriptor),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epo_backend::memory::InMemoryRepositoryBackend;
    use epo_model::EntityKind;

    #[tokio::test]
    async fn second_call_reuses_repository() {
        let git = Arc::new(InMemoryRepositoryBackend::new("git"));
        let p = RepositoryProvisioner::new(Some(git.clone()), Duration::from_secs(1));
        let d = EntityDescriptor::new(EntityKind::Program, "CPA", "Alpha");

        let a = p.ensure_repository(&d).await.unwrap();
        let b = p.ensure_repository(&d).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(git.repositories_created(), 1);
    }

    #[tokio::test]
    async fn remote_failure_propagates() {
        let git = Arc::new(InMemoryRepositoryBackend::new("git"));
        git.faults().fail_always(true);
        let p = RepositoryProvisioner::new(Some(git), Duration::from_secs(1));
        let d = EntityDescriptor::new(EntityKind::Program, "CPA", "Alpha");

        assert!(p.ensure_repository(&d).await.unwrap_err().is_recoverable());
    }
}
