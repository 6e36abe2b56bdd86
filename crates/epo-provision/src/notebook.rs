//! Notebook folder provisioning

use crate::timeout::bounded;
use epo_backend::{BackendError, BackendResult, BackendSlot, NotebookBackend};
use epo_model::{ElnFolder, EntityDescriptor};
use std::sync::Arc;
use std::time::Duration;

/// Result of provisioning a notebook folder
///
/// The folder is kept even when its summary entry could not be created;
/// `entry_error` then carries the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookProvisioning {
    pub folder: ElnFolder,
    pub entry_error: Option<BackendError>,
}

/// Find-or-create for notebook folders and summary entries
#[derive(Clone)]
pub struct NotebookProvisioner {
    backend: Option<Arc<dyn NotebookBackend>>,
    timeout: Duration,
}

impl std::fmt::Debug for NotebookProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookProvisioner")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl NotebookProvisioner {
    #[must_use]
    pub fn new(backend: Option<Arc<dyn NotebookBackend>>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    #[inline]
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> BackendResult<&Arc<dyn NotebookBackend>> {
        self.backend
            .as_ref()
            .ok_or(BackendError::NotConfigured(BackendSlot::Notebook))
    }

    /// Find-or-create the entity's notebook folder
    ///
    /// # Errors
    /// `NotConfigured`, `PathCollision`, `RemoteCallFailed` or `Timeout`
    pub async fn ensure_folder(
        &self,
        parent: Option<&ElnFolder>,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<ElnFolder> {
        let backend = self.backend()?;
        bounded(
            "notebook.ensure_folder",
            self.timeout,
            backend.ensure_folder(parent, descriptor),
        )
        .await
    }

    /// Re-read a folder linked earlier by its external id
    ///
    /// # Errors
    /// `NotConfigured`, `RemoteCallFailed` or `Timeout`
    pub async fn get_folder(&self, linked: &ElnFolder) -> BackendResult<Option<ElnFolder>> {
        let backend = self.backend()?;
        bounded(
            "notebook.get_folder",
            self.timeout,
            backend.get_folder(&linked.external_id),
        )
        .await
    }

    /// Locate the entity's notebook folder without creating it
    ///
    /// # Errors
    /// `NotConfigured`, `PathCollision`, `RemoteCallFailed` or `Timeout`
    pub async fn find_folder(
        &self,
        parent: Option<&ElnFolder>,
        descriptor: &EntityDescriptor,
    ) -> BackendResult<Option<ElnFolder>> {
        let backend = self.backend()?;
        bounded(
            "notebook.find_folder",
            self.timeout,
            backend.find_folder(parent, descriptor),
        )
        .await
    }

    /// Folder plus summary entry
    ///
    /// The template is resolved first so an unknown id fails before anything
    /// is created remotely.
    ///
    /// # Errors
    /// - `NotFound` if `template_id` is unknown
    /// - any error from [`ensure_folder`](Self::ensure_folder)
    pub async fn provision(
        &self,
        parent: Option<&ElnFolder>,
        descriptor: &EntityDescriptor,
        template_id: Option<&str>,
    ) -> BackendResult<NotebookProvisioning> {
        let backend = self.backend()?;

        let template = match template_id {
            Some(id) => Some(
                bounded(
                    "notebook.find_entry_template",
                    self.timeout,
                    backend.find_entry_template_by_id(id),
                )
                .await?
                .ok_or_else(|| BackendError::NotFound(format!("entry template {id}")))?,
            ),
            None => None,
        };

        let mut folder = self.ensure_folder(parent, descriptor).await?;

        let entry = bounded(
            "notebook.create_summary_entry",
            self.timeout,
            backend.create_summary_entry(&folder, descriptor, template.as_ref()),
        )
        .await;

        let entry_error = match entry {
            Ok(entry) => {
                folder.summary_entry = Some(entry);
                None
            }
            Err(err) => {
                tracing::warn!(entity = %descriptor.code, error = %err, "summary entry not created");
                Some(err)
            }
        };
        Ok(NotebookProvisioning { folder, entry_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epo_backend::memory::InMemoryNotebookBackend;
    use epo_backend::EntryTemplate;
    use epo_model::EntityKind;

    fn setup() -> (Arc<InMemoryNotebookBackend>, NotebookProvisioner) {
        let eln = Arc::new(InMemoryNotebookBackend::new("eln"));
        eln.register_template(EntryTemplate::new("tmpl_1", "Summary"));
        let p = NotebookProvisioner::new(Some(eln.clone()), Duration::from_secs(1));
        (eln, p)
    }

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(EntityKind::Program, "CPA", "Alpha")
    }

    #[tokio::test]
    async fn provision_creates_folder_and_entry() {
        let (eln, p) = setup();
        let out = p.provision(None, &descriptor(), Some("tmpl_1")).await.unwrap();

        assert!(out.entry_error.is_none());
        assert!(out.folder.summary_entry.is_some());
        assert_eq!(eln.entries_in(&out.folder.external_id), 1);
    }

    #[tokio::test]
    async fn unknown_template_creates_nothing() {
        let (eln, p) = setup();
        let err = p.provision(None, &descriptor(), Some("nope")).await.unwrap_err();

        assert!(matches!(err, BackendError::NotFound(_)));
        assert_eq!(eln.folders_created(), 0);
    }

    #[tokio::test]
    async fn entry_failure_keeps_folder() {
        let (eln, p) = setup();
        eln.entry_faults().fail_next(1);

        let out = p.provision(None, &descriptor(), None).await.unwrap();
        assert!(out.entry_error.is_some());
        assert!(out.folder.summary_entry.is_none());
        assert!(eln.contains_folder(&out.folder.path));
    }

    #[tokio::test]
    async fn unconfigured_reports_not_configured() {
        let p = NotebookProvisioner::new(None, Duration::from_secs(1));
        assert!(!p.is_configured());
        let err = p.ensure_folder(None, &descriptor()).await.unwrap_err();
        assert_eq!(err, BackendError::NotConfigured(BackendSlot::Notebook));
    }
}
