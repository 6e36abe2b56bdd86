use super::faults::FaultInjector;
use crate::error::BackendResult;
use crate::traits::RepositoryBackend;
use async_trait::async_trait;
use epo_model::{EntityDescriptor, EntityKind, GitRepository};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// In-memory git service; programs map to groups, studies and assays to
/// repositories inside their parent's group
#[derive(Debug)]
pub struct InMemoryRepositoryBackend {
    label: String,
    repositories: Mutex<BTreeMap<String, GitRepository>>,
    faults: FaultInjector,
    created: AtomicUsize,
}

impl InMemoryRepositoryBackend {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            repositories: Mutex::new(BTreeMap::new()),
            faults: FaultInjector::new(),
            created: AtomicUsize::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    #[must_use]
    pub fn repositories_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn full_path(descriptor: &EntityDescriptor) -> String {
        match (descriptor.kind, descriptor.parent_code.as_deref()) {
            (EntityKind::Program, _) | (_, None) => descriptor.repository_name(),
            (_, Some(parent)) => format!("{}/{}", parent.to_lowercase(), descriptor.repository_name()),
        }
    }
}

#[async_trait]
impl RepositoryBackend for InMemoryRepositoryBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn find_repository(
        &self,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<Option<GitRepository>> {
        self.faults.before_call(&self.label, "find_repository").await?;
        Ok(self
            .repositories
            .lock()
            .get(&Self::full_path(descriptor))
            .cloned())
    }

    async fn create_repository(
        &self,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<GitRepository> {
        self.faults.before_call(&self.label, "create_repository").await?;
        let path = Self::full_path(descriptor);
        let repo = GitRepository {
            name: descriptor.repository_name(),
            url: format!("git@git.example.com:{path}.git"),
            web_url: format!("https://git.example.com/{path}"),
            external_id: Uuid::new_v4().to_string(),
        };
        self.repositories.lock().insert(path, repo.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(repo)
    }
}
