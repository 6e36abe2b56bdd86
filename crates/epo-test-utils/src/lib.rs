//! Testing utilities for the EPO workspace
//!
//! [`TestHarness`] wires a [`ProvisioningOrchestrator`] to in-memory storage,
//! notebook and git backends and an in-memory store, and keeps handles to
//! each so tests can inject faults and inspect what was created.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use epo_backend::memory::{
    InMemoryNotebookBackend, InMemoryRepositoryBackend, InMemoryStorageBackend,
};
use epo_backend::{EntryTemplate, GitServiceType, NotebookIntegrationType};
use epo_codegen::CodeStrategy;
use epo_core::{InMemoryEntityStore, OrchestratorConfig, ProvisioningOrchestrator};
use epo_model::{
    AssayType, CustomFieldDef, FieldType, Program, ProvisioningOptions, StorageDrive,
    StorageDriveType, Study,
};
use std::sync::Arc;
use std::time::Duration;

pub const DRIVE_ID: &str = "local";
pub const DRIVE_ROOT: &str = "/data";
pub const PROGRAM_ROOT: &str = "/data/programs";
pub const SUMMARY_TEMPLATE_ID: &str = "tmpl_summary";

/// Install a test-writer subscriber once per process; later calls are no-ops
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn local_drive() -> StorageDrive {
    StorageDrive::new(DRIVE_ID, StorageDriveType::LocalFileSystem, DRIVE_ROOT)
}

/// Second drive for additional-folder tests; has no registered backend
/// unless the harness is built with [`HarnessBuilder::with_archive_drive`]
pub fn archive_drive() -> StorageDrive {
    StorageDrive::new("archive", StorageDriveType::S3, "/archive")
}

/// Orchestrator plus handles to every in-memory collaborator
pub struct TestHarness {
    pub orchestrator: ProvisioningOrchestrator,
    pub store: Arc<InMemoryEntityStore>,
    pub storage: Arc<InMemoryStorageBackend>,
    pub archive: Arc<InMemoryStorageBackend>,
    pub notebook: Arc<InMemoryNotebookBackend>,
    pub git: Arc<InMemoryRepositoryBackend>,
}

impl TestHarness {
    /// Storage, notebook and git all configured; `Sequence` codes
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Create a program with every resource
    pub async fn seed_program(&self, code: &str, name: &str) -> Program {
        self.orchestrator
            .create_program(Program::new(code, name), ProvisioningOptions::all())
            .await
            .unwrap()
            .entity
    }

    /// Create a study under `program` with every resource
    pub async fn seed_study(&self, program: &Program, name: &str) -> Study {
        self.orchestrator
            .create_study(
                Study::new(program.id.unwrap(), name),
                ProvisioningOptions::all(),
            )
            .await
            .unwrap()
            .entity
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct HarnessBuilder {
    config: OrchestratorConfig,
    notebook: bool,
    git: bool,
    archive: bool,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            config: OrchestratorConfig::default()
                .with_drive(local_drive())
                .with_default_drive(DRIVE_ID)
                .with_program_root_folder("programs")
                .with_notebook(Some(NotebookIntegrationType::Benchling))
                .with_git(Some(GitServiceType::GitLab)),
            notebook: true,
            git: true,
            archive: false,
        }
    }
}

impl HarnessBuilder {
    #[must_use]
    pub fn with_strategy(mut self, strategy: CodeStrategy) -> Self {
        self.config = self.config.with_code_strategy(strategy);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_backend_timeout(timeout);
        self
    }

    /// No notebook integration selected
    #[must_use]
    pub fn without_notebook(mut self) -> Self {
        self.config = self.config.with_notebook(None);
        self.notebook = false;
        self
    }

    /// No git service selected
    #[must_use]
    pub fn without_git(mut self) -> Self {
        self.config = self.config.with_git(None);
        self.git = false;
        self
    }

    /// Declare and back the `archive` drive
    #[must_use]
    pub fn with_archive_drive(mut self) -> Self {
        self.config = self.config.with_drive(archive_drive());
        self.archive = true;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn build(self) -> TestHarness {
        let storage = Arc::new(InMemoryStorageBackend::new("local"));
        let archive = Arc::new(InMemoryStorageBackend::new("archive"));
        let notebook = Arc::new(InMemoryNotebookBackend::new("benchling"));
        notebook.register_template(EntryTemplate::new(SUMMARY_TEMPLATE_ID, "Study Summary"));
        let git = Arc::new(InMemoryRepositoryBackend::new("gitlab"));

        let mut builder = self.config.backends_builder().unwrap();
        builder
            .register_storage(StorageDriveType::LocalFileSystem, storage.clone())
            .unwrap();
        if self.archive {
            builder
                .register_storage(StorageDriveType::S3, archive.clone())
                .unwrap();
        }
        if self.notebook {
            builder
                .register_notebook(NotebookIntegrationType::Benchling, notebook.clone())
                .unwrap();
        }
        if self.git {
            builder
                .register_git(GitServiceType::GitLab, git.clone())
                .unwrap();
        }

        let store = Arc::new(InMemoryEntityStore::new());
        let orchestrator =
            ProvisioningOrchestrator::new(self.config, Arc::new(builder.build()), store.clone());

        TestHarness {
            orchestrator,
            store,
            storage,
            archive,
            notebook,
            git,
        }
    }
}

/// Assay type with one required string field, a numeric field and a
/// dropdown
pub fn binding_assay_type() -> AssayType {
    AssayType::new("Binding")
        .with_field(CustomFieldDef::new("target", FieldType::String).required())
        .with_field(CustomFieldDef::new("replicates", FieldType::Integer))
        .with_field(CustomFieldDef::new("readout", FieldType::Dropdown).with_options(["SPR", "ITC"]))
}

/// Assay type with a file field
pub fn imaging_assay_type() -> AssayType {
    AssayType::new("Imaging")
        .with_field(CustomFieldDef::new("protocol", FieldType::File))
        .with_field(CustomFieldDef::new("magnification", FieldType::Integer))
}
