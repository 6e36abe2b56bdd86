//! Provisioning orchestrator
//!
//! Drives a creation through the state machine in [`crate::state`]:
//! validation, code assignment, mandatory storage, optional notebook and
//! repository (concurrently), one persistence transaction, then best-effort
//! link attachment. Also hosts updates, status changes and the repair
//! operations that reconcile local folder records with the remote systems.

use crate::cancel::CancellationFlag;
use crate::config::OrchestratorConfig;
use crate::error::{OptionalStep, ProvisionError, ProvisioningWarning, StoreError, ValidationError};
use crate::outcome::{ProvisioningOutcome, RepairAction, RepairReport};
use crate::state::{ProvisioningState, StateTrace};
use crate::store::EntityStore;
use crate::validation;
use epo_backend::{BackendError, BackendResult, Backends};
use epo_codegen::{CodeCounter, CodeGenerator};
use epo_model::{
    Assay, ElnFolder, EntityDescriptor, EntityId, EntityKind, EntityRef, ExternalLink, FieldValue,
    FileRef, FolderSet, GitRepository, Program, ProvisioningOptions, RunId, Status,
    StorageDriveFolder, Study,
};
use epo_provision::{
    NotebookProvisioner, NotebookProvisioning, RepositoryProvisioner, StorageProvisioner,
};
use std::sync::Arc;

const SUMMARY_LINK: &str = "Summary ELN Entry";
const REPOSITORY_LINK: &str = "Git Repository";
const REPAIR_USER: &str = "repair";

/// Resource references shared by every entity kind
trait Record {
    fn folders(&self) -> &FolderSet;
    fn folders_mut(&mut self) -> &mut FolderSet;
    fn eln_folder_mut(&mut self) -> &mut Option<ElnFolder>;
    fn git_repository_mut(&mut self) -> &mut Option<GitRepository>;
    fn links_mut(&mut self) -> &mut Vec<ExternalLink>;
    fn touch(&mut self, user: &str);
}

macro_rules! impl_record {
    ($($ty:ty),*) => {
        $(impl Record for $ty {
            fn folders(&self) -> &FolderSet {
                &self.folders
            }
            fn folders_mut(&mut self) -> &mut FolderSet {
                &mut self.folders
            }
            fn eln_folder_mut(&mut self) -> &mut Option<ElnFolder> {
                &mut self.eln_folder
            }
            fn git_repository_mut(&mut self) -> &mut Option<GitRepository> {
                &mut self.git_repository
            }
            fn links_mut(&mut self) -> &mut Vec<ExternalLink> {
                &mut self.links
            }
            fn touch(&mut self, user: &str) {
                self.audit.touch(user);
            }
        })*
    };
}

impl_record!(Program, Study, Assay);

/// Where the notebook folder goes
enum NotebookParent {
    /// Programs sit at the notebook root
    Root,
    Folder(ElnFolder),
    /// Parent has no notebook folder; the step is skipped
    Missing,
}

/// Inputs to the remote steps of one creation
struct Plan {
    descriptor: EntityDescriptor,
    storage_parent: BackendResult<StorageDriveFolder>,
    notebook_parent: NotebookParent,
    options: ProvisioningOptions,
    /// `(field, temporary path)` of FILE values to move into the new folder
    uploads: Vec<(String, String)>,
}

/// Remote resources produced by the provisioning steps
#[derive(Debug, Default)]
struct Provisioned {
    primary: Option<StorageDriveFolder>,
    additional: Vec<StorageDriveFolder>,
    eln_folder: Option<ElnFolder>,
    repository: Option<GitRepository>,
    /// `(field, new path)` of moved uploads
    moved: Vec<(String, String)>,
}

impl Provisioned {
    /// Remote locations, for reporting orphans
    fn remote_resources(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .primary
            .iter()
            .chain(&self.additional)
            .map(|f| f.path.clone())
            .collect();
        out.extend(self.eln_folder.iter().map(|f| f.url.clone()));
        out.extend(self.repository.iter().map(|r| r.web_url.clone()));
        out
    }

    fn links(&self) -> Vec<ExternalLink> {
        let mut links = Vec::new();
        if let Some(entry) = self.eln_folder.as_ref().and_then(|f| f.summary_entry.as_ref()) {
            links.push(ExternalLink::new(SUMMARY_LINK, &entry.url));
        }
        if let Some(repo) = &self.repository {
            links.push(ExternalLink::new(REPOSITORY_LINK, &repo.web_url));
        }
        links
    }

    fn apply_to<R: Record>(self, record: &mut R) {
        if let Some(primary) = self.primary {
            record.folders_mut().replace_primary(primary);
        }
        for folder in self.additional {
            if let Err(err) = record.folders_mut().insert(folder) {
                tracing::debug!(error = %err, "additional folder already linked");
            }
        }
        if self.eln_folder.is_some() {
            *record.eln_folder_mut() = self.eln_folder;
        }
        if self.repository.is_some() {
            *record.git_repository_mut() = self.repository;
        }
    }
}

fn mandatory(descriptor: &EntityDescriptor) -> impl Fn(BackendError) -> ProvisionError + '_ {
    move |source| ProvisionError::MandatoryProvisioning {
        entity: descriptor.code.clone(),
        source,
    }
}

/// Explicit parent folder, else the parent entity's primary folder
fn storage_parent(
    options: &ProvisioningOptions,
    inherited: Option<&StorageDriveFolder>,
    owner: &str,
) -> BackendResult<StorageDriveFolder> {
    match &options.parent_folder {
        Some(folder) => Ok(folder.clone()),
        None => primary_folder(inherited, owner),
    }
}

fn primary_folder(
    folder: Option<&StorageDriveFolder>,
    owner: &str,
) -> BackendResult<StorageDriveFolder> {
    folder
        .cloned()
        .ok_or_else(|| BackendError::NotFound(format!("primary folder of {owner}")))
}

/// A generated code that is already stored; raised before any remote call
fn generated_code_taken(kind: EntityKind, code: String) -> ProvisionError {
    tracing::warn!(%kind, %code, "generated code already in use");
    ValidationError::DuplicateCode { kind, code }.into()
}

fn persistence_error(code: String, orphaned: Vec<String>, source: StoreError) -> ProvisionError {
    if !orphaned.is_empty() {
        tracing::error!(
            %code,
            ?orphaned,
            collision = source.is_unique_violation(),
            error = %source,
            "save failed, remote resources orphaned"
        );
    }
    ProvisionError::PersistenceConflict {
        code,
        orphaned,
        source,
    }
}

fn finish<T>(
    run_id: RunId,
    result: Result<(T, Vec<ProvisioningWarning>), ProvisionError>,
    mut trace: StateTrace,
) -> Result<ProvisioningOutcome<T>, ProvisionError> {
    match result {
        Ok((entity, warnings)) => {
            tracing::info!(%run_id, warnings = warnings.len(), "provisioning complete");
            Ok(ProvisioningOutcome {
                run_id,
                entity,
                states: trace.into_states(),
                warnings,
            })
        }
        Err(err) => {
            let at = trace.current();
            trace.abort();
            tracing::error!(%run_id, %at, error = %err, "provisioning aborted");
            Err(err)
        }
    }
}

/// Creates, updates and repairs programs, studies and assays
pub struct ProvisioningOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn EntityStore>,
    codes: CodeGenerator,
    storage: StorageProvisioner,
    notebook: NotebookProvisioner,
    repository: RepositoryProvisioner,
}

impl std::fmt::Debug for ProvisioningOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningOrchestrator")
            .field("codes", &self.codes)
            .field("storage", &self.storage)
            .field("notebook", &self.notebook)
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl ProvisioningOrchestrator {
    /// Wire the orchestrator; `store` also counts existing records for code
    /// generation
    #[must_use]
    pub fn new<S>(config: OrchestratorConfig, backends: Arc<Backends>, store: Arc<S>) -> Self
    where
        S: EntityStore + CodeCounter + 'static,
    {
        let timeout = config.backend_timeout();
        let counter: Arc<dyn CodeCounter> = store.clone();
        let codes = CodeGenerator::new(config.codes, config.code_strategy, counter);

        let mut storage = StorageProvisioner::new(backends.clone(), timeout);
        if let Some(root) = config.program_root() {
            storage = storage.with_program_root(root);
        }
        let notebook = NotebookProvisioner::new(backends.notebook(), timeout);
        let repository = RepositoryProvisioner::new(backends.git(), timeout);

        Self {
            config,
            store,
            codes,
            storage,
            notebook,
            repository,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn code_generator(&self) -> &CodeGenerator {
        &self.codes
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a program with its resources
    ///
    /// # Errors
    /// See [`ProvisionError`]; nothing is persisted on error.
    pub async fn create_program(
        &self,
        program: Program,
        options: ProvisioningOptions,
    ) -> Result<ProvisioningOutcome<Program>, ProvisionError> {
        self.create_program_with_cancel(program, options, &CancellationFlag::new())
            .await
    }

    /// [`create_program`](Self::create_program) with a cancellation signal
    ///
    /// # Errors
    /// See [`ProvisionError`]
    #[tracing::instrument(skip_all, fields(kind = "program", code = %program.code))]
    pub async fn create_program_with_cancel(
        &self,
        program: Program,
        options: ProvisioningOptions,
        cancel: &CancellationFlag,
    ) -> Result<ProvisioningOutcome<Program>, ProvisionError> {
        let mut trace = StateTrace::new();
        let result = self.run_program(program, options, cancel, &mut trace).await;
        finish(RunId::new(), result, trace)
    }

    /// Create a study with its resources
    ///
    /// # Errors
    /// See [`ProvisionError`]; nothing is persisted on error.
    pub async fn create_study(
        &self,
        study: Study,
        options: ProvisioningOptions,
    ) -> Result<ProvisioningOutcome<Study>, ProvisionError> {
        self.create_study_with_cancel(study, options, &CancellationFlag::new())
            .await
    }

    /// [`create_study`](Self::create_study) with a cancellation signal
    ///
    /// # Errors
    /// See [`ProvisionError`]
    #[tracing::instrument(skip_all, fields(kind = "study", name = %study.name, program = %study.program_id))]
    pub async fn create_study_with_cancel(
        &self,
        study: Study,
        options: ProvisioningOptions,
        cancel: &CancellationFlag,
    ) -> Result<ProvisioningOutcome<Study>, ProvisionError> {
        let mut trace = StateTrace::new();
        let result = self.run_study(study, options, cancel, &mut trace).await;
        finish(RunId::new(), result, trace)
    }

    /// Create an assay with its resources
    ///
    /// # Errors
    /// See [`ProvisionError`]; nothing is persisted on error.
    pub async fn create_assay(
        &self,
        assay: Assay,
        options: ProvisioningOptions,
    ) -> Result<ProvisioningOutcome<Assay>, ProvisionError> {
        self.create_assay_with_cancel(assay, options, &CancellationFlag::new())
            .await
    }

    /// [`create_assay`](Self::create_assay) with a cancellation signal
    ///
    /// # Errors
    /// See [`ProvisionError`]
    #[tracing::instrument(skip_all, fields(kind = "assay", name = %assay.name, study = %assay.study_id))]
    pub async fn create_assay_with_cancel(
        &self,
        assay: Assay,
        options: ProvisioningOptions,
        cancel: &CancellationFlag,
    ) -> Result<ProvisioningOutcome<Assay>, ProvisionError> {
        let mut trace = StateTrace::new();
        let result = self.run_assay(assay, options, cancel, &mut trace).await;
        finish(RunId::new(), result, trace)
    }

    async fn run_program(
        &self,
        mut program: Program,
        options: ProvisioningOptions,
        cancel: &CancellationFlag,
        trace: &mut StateTrace,
    ) -> Result<(Program, Vec<ProvisioningWarning>), ProvisionError> {
        self.validate_program(&program).await?;
        trace.advance(ProvisioningState::CodeAssigned)?;

        let plan = Plan {
            descriptor: program.descriptor(),
            storage_parent: match &options.parent_folder {
                Some(folder) => Ok(folder.clone()),
                None => self.storage.program_root().cloned(),
            },
            notebook_parent: NotebookParent::Root,
            options,
            uploads: Vec::new(),
        };

        let mut warnings = Vec::new();
        let provisioned = self.provision(&plan, trace, &mut warnings, cancel).await?;
        let orphaned = provisioned.remote_resources();
        let links = provisioned.links();
        provisioned.apply_to(&mut program);

        let mut program = self
            .store
            .save_program(program)
            .await
            .map_err(|e| persistence_error(plan.descriptor.code.clone(), orphaned, e))?;
        trace.advance(ProvisioningState::Persisted)?;
        tracing::info!(code = %program.code, "program persisted");

        if let Some(id) = program.id {
            self.attach_links(EntityRef::Program(id), links, &mut program, &mut warnings)
                .await;
        }
        trace.advance(ProvisioningState::LinksAttached)?;
        Ok((program, warnings))
    }

    async fn run_study(
        &self,
        mut study: Study,
        options: ProvisioningOptions,
        cancel: &CancellationFlag,
        trace: &mut StateTrace,
    ) -> Result<(Study, Vec<ProvisioningWarning>), ProvisionError> {
        let program = self.validate_study(&study).await?;

        if study.code.is_none() {
            let code = self.codes.generate_study_code(&program, &study).await?;
            if self.store.find_study_by_code(&code).await?.is_some() {
                return Err(generated_code_taken(EntityKind::Study, code));
            }
            study.code = Some(code);
        }
        if study.external_code.is_none() && !study.legacy {
            study.external_code = self.codes.generate_external_code(&study).await?;
        }
        let descriptor = coded(study.descriptor(&program.code), EntityKind::Study)?;
        trace.advance(ProvisioningState::CodeAssigned)?;
        tracing::info!(code = %descriptor.code, external = ?study.external_code, "study code assigned");

        let plan = Plan {
            storage_parent: storage_parent(&options, program.folders.primary(), &program.code),
            notebook_parent: program
                .eln_folder
                .clone()
                .map_or(NotebookParent::Missing, NotebookParent::Folder),
            descriptor,
            options,
            uploads: Vec::new(),
        };

        let mut warnings = Vec::new();
        let provisioned = self.provision(&plan, trace, &mut warnings, cancel).await?;
        let orphaned = provisioned.remote_resources();
        let links = provisioned.links();
        provisioned.apply_to(&mut study);

        let mut study = self
            .store
            .save_study(study)
            .await
            .map_err(|e| persistence_error(plan.descriptor.code.clone(), orphaned, e))?;
        trace.advance(ProvisioningState::Persisted)?;
        tracing::info!(code = %plan.descriptor.code, "study persisted");

        if let Some(id) = study.id {
            self.attach_links(EntityRef::Study(id), links, &mut study, &mut warnings)
                .await;
        }
        trace.advance(ProvisioningState::LinksAttached)?;
        Ok((study, warnings))
    }

    async fn run_assay(
        &self,
        mut assay: Assay,
        options: ProvisioningOptions,
        cancel: &CancellationFlag,
        trace: &mut StateTrace,
    ) -> Result<(Assay, Vec<ProvisioningWarning>), ProvisionError> {
        let study = self.validate_assay(&assay).await?;

        if assay.code.is_none() {
            let code = self.codes.generate_assay_code(&study, &assay).await?;
            if self.store.find_assay_by_code(&code).await?.is_some() {
                return Err(generated_code_taken(EntityKind::Assay, code));
            }
            assay.code = Some(code);
        }
        let study_code = study.code.clone().unwrap_or_default();
        let descriptor = coded(assay.descriptor(&study_code), EntityKind::Assay)?;
        trace.advance(ProvisioningState::CodeAssigned)?;
        tracing::info!(code = %descriptor.code, "assay code assigned");

        let uploads = assay
            .fields
            .iter()
            .filter_map(|(name, value)| match value {
                FieldValue::File(file) => Some((name.clone(), file.path.clone())),
                _ => None,
            })
            .collect();
        let plan = Plan {
            storage_parent: storage_parent(&options, study.folders.primary(), &study_code),
            notebook_parent: study
                .eln_folder
                .clone()
                .map_or(NotebookParent::Missing, NotebookParent::Folder),
            descriptor,
            options,
            uploads,
        };

        let mut warnings = Vec::new();
        let mut provisioned = self.provision(&plan, trace, &mut warnings, cancel).await?;
        for (field, path) in std::mem::take(&mut provisioned.moved) {
            assay.fields.insert(field, FieldValue::File(FileRef { path }));
        }
        let orphaned = provisioned.remote_resources();
        let links = provisioned.links();
        provisioned.apply_to(&mut assay);

        let mut assay = self
            .store
            .save_assay(assay)
            .await
            .map_err(|e| persistence_error(plan.descriptor.code.clone(), orphaned, e))?;
        trace.advance(ProvisioningState::Persisted)?;
        tracing::info!(code = %plan.descriptor.code, "assay persisted");

        if let Some(id) = assay.id {
            self.attach_links(EntityRef::Assay(id), links, &mut assay, &mut warnings)
                .await;
        }
        trace.advance(ProvisioningState::LinksAttached)?;
        Ok((assay, warnings))
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    async fn validate_program(&self, program: &Program) -> Result<(), ProvisionError> {
        let kind = EntityKind::Program;
        validation::require_new(kind, program.id)?;
        validation::require_name(kind, &program.name)?;
        if program.code.trim().is_empty() {
            return Err(ValidationError::BlankCode { kind }.into());
        }
        if self.store.find_program_by_name(&program.name).await?.is_some() {
            return Err(ValidationError::DuplicateName {
                kind,
                name: program.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Returns the parent program
    async fn validate_study(&self, study: &Study) -> Result<Program, ProvisionError> {
        let kind = EntityKind::Study;
        validation::require_new(kind, study.id)?;
        validation::require_name(kind, &study.name)?;
        validation::check_explicit_code(kind, study.code.as_deref(), study.legacy)?;
        if let Some(code) = study.code.as_deref() {
            if self.store.find_study_by_code(code).await?.is_some() {
                return Err(ValidationError::DuplicateCode {
                    kind,
                    code: code.to_string(),
                }
                .into());
            }
        }

        let program = self
            .store
            .get_program(study.program_id)
            .await?
            .ok_or_else(|| ValidationError::InvalidParent {
                kind,
                reason: format!("program {} does not exist", study.program_id),
            })?;
        if !program.active {
            return Err(ValidationError::InvalidParent {
                kind,
                reason: format!("program {} is inactive", program.code),
            }
            .into());
        }
        Ok(program)
    }

    /// Returns the parent study
    async fn validate_assay(&self, assay: &Assay) -> Result<Study, ProvisionError> {
        let kind = EntityKind::Assay;
        validation::require_new(kind, assay.id)?;
        validation::require_name(kind, &assay.name)?;
        validation::check_explicit_code(kind, assay.code.as_deref(), assay.legacy)?;
        if let Some(code) = assay.code.as_deref() {
            if self.store.find_assay_by_code(code).await?.is_some() {
                return Err(ValidationError::DuplicateCode {
                    kind,
                    code: code.to_string(),
                }
                .into());
            }
        }

        let study = self
            .store
            .get_study(assay.study_id)
            .await?
            .ok_or_else(|| ValidationError::InvalidParent {
                kind,
                reason: format!("study {} does not exist", assay.study_id),
            })?;
        if !study.active {
            return Err(ValidationError::InvalidParent {
                kind,
                reason: format!("study {} is inactive", study.code.as_deref().unwrap_or("?")),
            }
            .into());
        }
        if study.code.is_none() {
            return Err(ValidationError::InvalidParent {
                kind,
                reason: format!("study {} has no code", assay.study_id),
            }
            .into());
        }
        validation::validate_fields(&assay.assay_type, assay.fields.iter())?;
        Ok(study)
    }

    // ------------------------------------------------------------------
    // Remote steps
    // ------------------------------------------------------------------

    async fn provision(
        &self,
        plan: &Plan,
        trace: &mut StateTrace,
        warnings: &mut Vec<ProvisioningWarning>,
        cancel: &CancellationFlag,
    ) -> Result<Provisioned, ProvisionError> {
        let descriptor = &plan.descriptor;
        let mut out = Provisioned::default();

        if plan.options.use_storage {
            cancel.check()?;
            let parent = plan.storage_parent.clone().map_err(mandatory(descriptor))?;
            let primary = self
                .storage
                .ensure_folder(&parent, descriptor)
                .await
                .map_err(mandatory(descriptor))?;
            tracing::info!(code = %descriptor.code, path = %primary.path, "storage folder provisioned");

            for extra in &plan.options.additional_folders {
                cancel.check()?;
                match self.storage.ensure_additional(extra, descriptor).await {
                    Ok(folder) => out.additional.push(folder),
                    Err(source) => {
                        tracing::warn!(code = %descriptor.code, drive = %extra.drive_id, error = %source, "additional folder not provisioned");
                        warnings.push(ProvisioningWarning::OptionalProvisioningFailure {
                            step: OptionalStep::AdditionalFolder,
                            source,
                        });
                    }
                }
            }

            for (field, source_path) in &plan.uploads {
                cancel.check()?;
                match self.storage.move_file(source_path, &primary).await {
                    Ok(path) => out.moved.push((field.clone(), path)),
                    Err(source) => {
                        tracing::warn!(code = %descriptor.code, %field, error = %source, "upload left at temporary location");
                        warnings.push(ProvisioningWarning::FileMoveFailure {
                            field: field.clone(),
                            source,
                        });
                    }
                }
            }

            out.primary = Some(primary);
            trace.advance(ProvisioningState::StorageProvisioned)?;
        } else {
            tracing::debug!(code = %descriptor.code, "storage not requested");
        }

        cancel.check()?;
        let (notebook, repository) =
            tokio::join!(self.notebook_step(plan), self.repository_step(plan));
        cancel.check()?;

        match notebook {
            Some(Ok(NotebookProvisioning {
                folder,
                entry_error,
            })) => {
                if let Some(source) = entry_error {
                    warnings.push(ProvisioningWarning::OptionalProvisioningFailure {
                        step: OptionalStep::NotebookEntry,
                        source,
                    });
                }
                tracing::info!(code = %descriptor.code, folder = %folder.path, "notebook folder provisioned");
                out.eln_folder = Some(folder);
                trace.advance(ProvisioningState::NotebookProvisioned)?;
            }
            Some(Err(source)) => {
                tracing::warn!(code = %descriptor.code, step = %OptionalStep::NotebookFolder, error = %source, "optional provisioning failed");
                warnings.push(ProvisioningWarning::OptionalProvisioningFailure {
                    step: OptionalStep::NotebookFolder,
                    source,
                });
            }
            None => {}
        }

        match repository {
            Some(Ok(repo)) => {
                tracing::info!(code = %descriptor.code, repo = %repo.web_url, "repository provisioned");
                out.repository = Some(repo);
                trace.advance(ProvisioningState::RepositoryProvisioned)?;
            }
            Some(Err(source)) => {
                tracing::warn!(code = %descriptor.code, step = %OptionalStep::Repository, error = %source, "optional provisioning failed");
                warnings.push(ProvisioningWarning::OptionalProvisioningFailure {
                    step: OptionalStep::Repository,
                    source,
                });
            }
            None => {}
        }

        Ok(out)
    }

    /// `None` when the step does not apply to this run
    async fn notebook_step(&self, plan: &Plan) -> Option<BackendResult<NotebookProvisioning>> {
        if !plan.options.use_notebook {
            return None;
        }
        if !self.notebook.is_configured() {
            tracing::debug!(code = %plan.descriptor.code, "notebook requested but not configured");
            return None;
        }
        let parent = match &plan.notebook_parent {
            NotebookParent::Root => None,
            NotebookParent::Folder(folder) => Some(folder),
            NotebookParent::Missing => {
                tracing::info!(code = %plan.descriptor.code, "parent has no notebook folder, skipping notebook");
                return None;
            }
        };
        Some(
            self.notebook
                .provision(
                    parent,
                    &plan.descriptor,
                    plan.options.notebook_template_id.as_deref(),
                )
                .await,
        )
    }

    /// `None` when the step does not apply to this run
    async fn repository_step(&self, plan: &Plan) -> Option<BackendResult<GitRepository>> {
        if !plan.options.use_git {
            return None;
        }
        if !self.repository.is_configured() {
            tracing::debug!(code = %plan.descriptor.code, "git requested but not configured");
            return None;
        }
        Some(self.repository.ensure_repository(&plan.descriptor).await)
    }

    async fn attach_links<R: Record>(
        &self,
        entity: EntityRef,
        links: Vec<ExternalLink>,
        record: &mut R,
        warnings: &mut Vec<ProvisioningWarning>,
    ) {
        for link in links {
            match self.store.append_link(entity, link.clone()).await {
                Ok(()) => record.links_mut().push(link),
                Err(source) => {
                    tracing::warn!(%entity, label = %link.label, error = %source, "link not attached");
                    warnings.push(ProvisioningWarning::LinkAttachmentFailure {
                        label: link.label,
                        source,
                    });
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Copy the mutable fields of `changes` onto the stored study
    ///
    /// Code, external code, parent and resource references are never changed
    /// through an update.
    ///
    /// # Errors
    /// - `Validation(MissingId | BlankName)`
    /// - `NotFound` if no study has the id
    /// - `Store` if the save fails
    #[tracing::instrument(skip_all, fields(study = ?changes.id))]
    pub async fn update_study(&self, changes: Study, user: &str) -> Result<Study, ProvisionError> {
        let kind = EntityKind::Study;
        let id = changes.id.ok_or(ValidationError::MissingId { kind })?;
        validation::require_name(kind, &changes.name)?;
        let mut study = self.load_study(id).await?;

        study.name = changes.name;
        study.description = changes.description;
        study.start_date = changes.start_date;
        study.end_date = changes.end_date;
        study.active = changes.active;
        study.touch(user);

        let saved = self.store.save_study(study).await?;
        tracing::info!(code = ?saved.code, "study updated");
        Ok(saved)
    }

    /// Copy the mutable fields of `changes` onto the stored assay; custom
    /// fields are re-validated against the stored assay type
    ///
    /// # Errors
    /// - `Validation(MissingId | BlankName | FieldSchema)`
    /// - `NotFound` if no assay has the id
    /// - `Store` if the save fails
    #[tracing::instrument(skip_all, fields(assay = ?changes.id))]
    pub async fn update_assay(&self, changes: Assay, user: &str) -> Result<Assay, ProvisionError> {
        let kind = EntityKind::Assay;
        let id = changes.id.ok_or(ValidationError::MissingId { kind })?;
        validation::require_name(kind, &changes.name)?;
        let mut assay = self.load_assay(id).await?;
        validation::validate_fields(&assay.assay_type, changes.fields.iter())?;

        assay.name = changes.name;
        assay.description = changes.description;
        assay.start_date = changes.start_date;
        assay.end_date = changes.end_date;
        assay.active = changes.active;
        assay.fields = changes.fields;
        assay.touch(user);

        let saved = self.store.save_assay(assay).await?;
        tracing::info!(code = ?saved.code, "assay updated");
        Ok(saved)
    }

    /// Set an entity's status; `Deprecated` also deactivates it
    ///
    /// # Errors
    /// - `NotFound` if the entity does not exist
    /// - `Store` if the save fails
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        entity: EntityRef,
        status: Status,
        user: &str,
    ) -> Result<(), ProvisionError> {
        let deactivate = status == Status::Deprecated;
        match entity {
            EntityRef::Program(id) => {
                let mut program = self.load_program(id).await?;
                program.status = status;
                program.active &= !deactivate;
                program.touch(user);
                self.store.save_program(program).await?;
            }
            EntityRef::Study(id) => {
                let mut study = self.load_study(id).await?;
                study.status = status;
                study.active &= !deactivate;
                study.touch(user);
                self.store.save_study(study).await?;
            }
            EntityRef::Assay(id) => {
                let mut assay = self.load_assay(id).await?;
                assay.status = status;
                assay.active &= !deactivate;
                assay.touch(user);
                self.store.save_assay(assay).await?;
            }
        }
        tracing::info!(%entity, ?status, "status updated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Repair
    // ------------------------------------------------------------------

    /// Reconcile the local primary folder record with the storage backend
    ///
    /// The linked folder is re-read first and kept while it exists. Only when
    /// it is gone (or nothing is linked) is the folder found or created under
    /// the parent's primary folder. Safe to repeat: a second run reports
    /// [`RepairAction::Unchanged`].
    ///
    /// # Errors
    /// - `NotFound` if the entity or its parent does not exist
    /// - `RepairFailed` if the parent folder is missing or the backend fails
    /// - `Store` if the corrected record cannot be saved
    #[tracing::instrument(skip(self))]
    pub async fn repair_storage_folder(
        &self,
        entity: EntityRef,
    ) -> Result<RepairReport, ProvisionError> {
        match entity {
            EntityRef::Program(id) => {
                let mut program = self.load_program(id).await?;
                let descriptor = program.descriptor();
                let parent = self.storage.program_root().cloned();
                let report = self
                    .reconcile_storage(entity, &mut program, parent, &descriptor)
                    .await?;
                if report.action != RepairAction::Unchanged {
                    self.store.save_program(program).await?;
                }
                Ok(report)
            }
            EntityRef::Study(id) => {
                let mut study = self.load_study(id).await?;
                let program = self.load_program(study.program_id).await?;
                let descriptor = coded(study.descriptor(&program.code), EntityKind::Study)?;
                let parent = primary_folder(program.folders.primary(), &program.code);
                let report = self
                    .reconcile_storage(entity, &mut study, parent, &descriptor)
                    .await?;
                if report.action != RepairAction::Unchanged {
                    self.store.save_study(study).await?;
                }
                Ok(report)
            }
            EntityRef::Assay(id) => {
                let mut assay = self.load_assay(id).await?;
                let study = self.load_study(assay.study_id).await?;
                let study_code = study.code.clone().unwrap_or_default();
                let descriptor = coded(assay.descriptor(&study_code), EntityKind::Assay)?;
                let parent = primary_folder(study.folders.primary(), &study_code);
                let report = self
                    .reconcile_storage(entity, &mut assay, parent, &descriptor)
                    .await?;
                if report.action != RepairAction::Unchanged {
                    self.store.save_assay(assay).await?;
                }
                Ok(report)
            }
        }
    }

    /// Reconcile the local notebook folder record with the notebook
    ///
    /// Same rule as [`repair_storage_folder`](Self::repair_storage_folder):
    /// the linked folder wins while it still exists.
    ///
    /// # Errors
    /// - `NotFound` if the entity or its parent does not exist
    /// - `RepairFailed` if the notebook is not configured, the parent has no
    ///   notebook folder, or the backend fails
    /// - `Store` if the corrected record cannot be saved
    #[tracing::instrument(skip(self))]
    pub async fn repair_notebook_folder(
        &self,
        entity: EntityRef,
    ) -> Result<RepairReport, ProvisionError> {
        match entity {
            EntityRef::Program(id) => {
                let mut program = self.load_program(id).await?;
                let descriptor = program.descriptor();
                let report = self
                    .reconcile_notebook(entity, &mut program, Ok(None), &descriptor)
                    .await?;
                if report.action != RepairAction::Unchanged {
                    self.store.save_program(program).await?;
                }
                Ok(report)
            }
            EntityRef::Study(id) => {
                let mut study = self.load_study(id).await?;
                let program = self.load_program(study.program_id).await?;
                let descriptor = coded(study.descriptor(&program.code), EntityKind::Study)?;
                let parent = notebook_parent(program.eln_folder, &program.code);
                let report = self
                    .reconcile_notebook(entity, &mut study, parent, &descriptor)
                    .await?;
                if report.action != RepairAction::Unchanged {
                    self.store.save_study(study).await?;
                }
                Ok(report)
            }
            EntityRef::Assay(id) => {
                let mut assay = self.load_assay(id).await?;
                let study = self.load_study(assay.study_id).await?;
                let study_code = study.code.clone().unwrap_or_default();
                let descriptor = coded(assay.descriptor(&study_code), EntityKind::Assay)?;
                let parent = notebook_parent(study.eln_folder, &study_code);
                let report = self
                    .reconcile_notebook(entity, &mut assay, parent, &descriptor)
                    .await?;
                if report.action != RepairAction::Unchanged {
                    self.store.save_assay(assay).await?;
                }
                Ok(report)
            }
        }
    }

    /// A linked folder that still exists is kept even if the entity was
    /// renamed since; find-or-create only runs when it is gone.
    async fn reconcile_storage<R: Record>(
        &self,
        entity: EntityRef,
        record: &mut R,
        parent: BackendResult<StorageDriveFolder>,
        descriptor: &EntityDescriptor,
    ) -> Result<RepairReport, ProvisionError> {
        let failed = |source: BackendError| ProvisionError::RepairFailed { entity, source };
        let linked = match record.folders().primary() {
            Some(local) => self.storage.get_folder(local).await.map_err(failed)?,
            None => None,
        };
        let remote = match linked {
            Some(remote) => remote,
            None => {
                let parent = parent.map_err(failed)?;
                self.storage
                    .ensure_folder(&parent, descriptor)
                    .await
                    .map_err(failed)?
            }
        };

        let action = match record.folders().primary() {
            None => RepairAction::Created,
            Some(local) if local.same_location(&remote) => RepairAction::Unchanged,
            Some(_) => RepairAction::Corrected,
        };
        if action != RepairAction::Unchanged {
            record.folders_mut().replace_primary(remote.clone());
            record.touch(REPAIR_USER);
        }
        tracing::info!(%entity, ?action, path = %remote.path, "storage folder reconciled");
        Ok(RepairReport {
            entity,
            action,
            location: remote.path,
        })
    }

    async fn reconcile_notebook<R: Record>(
        &self,
        entity: EntityRef,
        record: &mut R,
        parent: BackendResult<Option<ElnFolder>>,
        descriptor: &EntityDescriptor,
    ) -> Result<RepairReport, ProvisionError> {
        let failed = |source: BackendError| ProvisionError::RepairFailed { entity, source };
        let slot = record.eln_folder_mut();
        let linked = match slot.as_ref() {
            Some(local) => self.notebook.get_folder(local).await.map_err(failed)?,
            None => None,
        };
        let mut remote = match linked {
            Some(remote) => remote,
            None => {
                let parent = parent.map_err(failed)?;
                self.notebook
                    .ensure_folder(parent.as_ref(), descriptor)
                    .await
                    .map_err(failed)?
            }
        };

        let action = match slot.as_ref() {
            None => RepairAction::Created,
            Some(local) if local.same_location(&remote) => RepairAction::Unchanged,
            Some(local) => {
                if local.external_id == remote.external_id {
                    remote.summary_entry.clone_from(&local.summary_entry);
                }
                RepairAction::Corrected
            }
        };
        let location = remote.path.clone();
        if action != RepairAction::Unchanged {
            *slot = Some(remote);
            record.touch(REPAIR_USER);
        }
        tracing::info!(%entity, ?action, path = %location, "notebook folder reconciled");
        Ok(RepairReport {
            entity,
            action,
            location,
        })
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    async fn load_program(&self, id: EntityId) -> Result<Program, ProvisionError> {
        self.store
            .get_program(id)
            .await?
            .ok_or(ProvisionError::NotFound(EntityRef::Program(id)))
    }

    async fn load_study(&self, id: EntityId) -> Result<Study, ProvisionError> {
        self.store
            .get_study(id)
            .await?
            .ok_or(ProvisionError::NotFound(EntityRef::Study(id)))
    }

    async fn load_assay(&self, id: EntityId) -> Result<Assay, ProvisionError> {
        self.store
            .get_assay(id)
            .await?
            .ok_or(ProvisionError::NotFound(EntityRef::Assay(id)))
    }
}

fn coded(
    descriptor: Option<EntityDescriptor>,
    kind: EntityKind,
) -> Result<EntityDescriptor, ProvisionError> {
    descriptor.ok_or_else(|| ValidationError::BlankCode { kind }.into())
}

fn notebook_parent(folder: Option<ElnFolder>, owner: &str) -> BackendResult<Option<ElnFolder>> {
    folder
        .map(Some)
        .ok_or_else(|| BackendError::NotFound(format!("notebook folder of {owner}")))
}
